pub mod address;
pub mod allocate;
pub mod backends;
pub mod classify;
pub mod events;
pub mod report;
pub mod state;

pub use address::{is_private, AllowList};
pub use allocate::{compute_caps, distribute_limits, Caps, DownloaderKind, DownloaderLimit};
pub use backends::SessionRecord;
pub use classify::{aggregate, Direction, PathRules, Usage};
pub use events::{EventKind, WebhookEvent};
pub use report::Notification;
pub use state::{LimiterState, Signature};

pub mod clients;
pub mod douban;
pub mod emby;
pub mod error;
pub mod notify;
pub mod plex;
pub mod qbittorrent;
pub mod traits;
pub mod transmission;

pub use clients::{DownloaderClient, MediaServerClient};
pub use error::ApiError;

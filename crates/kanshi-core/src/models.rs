mod playback;
mod rank;

pub use playback::{MediaKind, PlaybackSession, PlayingItem, ServerKind};
pub use rank::{MediaType, RankEntry, Region};

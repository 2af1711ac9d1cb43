use serde::{Deserialize, Serialize};

const START_EVENTS: &[&str] = &["playback.start", "PlaybackStart", "media.play"];
const STOP_EVENTS: &[&str] = &["playback.stop", "PlaybackStop", "media.stop"];

/// A playback webhook pushed by a media server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Name of the configured media server that sent the event.
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub item_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Stop,
}

impl EventKind {
    /// Recognize the start/stop event names of Emby, Jellyfin and Plex.
    pub fn from_event(name: &str) -> Option<Self> {
        if START_EVENTS.contains(&name) {
            Some(Self::Start)
        } else if STOP_EVENTS.contains(&name) {
            Some(Self::Stop)
        } else {
            None
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Start => "[+]",
            Self::Stop => "[-]",
        }
    }
}

impl WebhookEvent {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_event(&self.event)
    }

    /// Notification title line, e.g. `[+] Movie`.
    pub fn title_line(&self) -> Option<String> {
        self.kind()
            .map(|k| format!("{} {}\n", k.marker(), self.item_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> WebhookEvent {
        WebhookEvent {
            event: name.into(),
            item_name: "Dune (2021)".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(event("PlaybackStart").kind(), Some(EventKind::Start));
        assert_eq!(event("media.play").kind(), Some(EventKind::Start));
        assert_eq!(event("playback.stop").kind(), Some(EventKind::Stop));
        assert_eq!(event("media.pause").kind(), None);
        assert_eq!(event("library.new").kind(), None);
    }

    #[test]
    fn test_title_line() {
        assert_eq!(event("playback.start").title_line().unwrap(), "[+] Dune (2021)\n");
        assert_eq!(event("PlaybackStop").title_line().unwrap(), "[-] Dune (2021)\n");
        assert!(event("item.rate").title_line().is_none());
    }
}

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Storage key of the subscription history blob.
pub const HISTORY_KEY: &str = "history_mod";

/// Marker recorded when the recognized title differs from the feed title.
pub const TIP_TITLE_MISMATCH: &str = "title mismatch";

/// One processed feed entry, persisted so it is not handled twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub title: String,
    pub rate: f64,
    pub count: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub genres: String,
    pub year: Option<String>,
    pub poster: Option<String>,
    pub overview: Option<String>,
    pub tmdbid: Option<u64>,
    pub doubanid: String,
    pub time: String,
    #[serde(default)]
    pub tip: String,
    pub unique: String,
}

/// Deduplication key for a feed entry.
pub fn unique_key(title: &str, douban_id: &str) -> String {
    format!("doubanrank: {title} (DB:{douban_id})")
}

/// Timestamp in the format shown by the history page.
pub fn now_label() -> String {
    Local::now().format("%m-%d %H:%M").to_string()
}

pub fn contains(history: &[HistoryRecord], key: &str) -> bool {
    history.iter().any(|h| h.unique == key)
}

/// Remove every record with the given key. Returns how many were removed.
pub fn delete_history_entry(history: &mut Vec<HistoryRecord>, key: &str) -> usize {
    let before = history.len();
    history.retain(|h| h.unique != key);
    before - history.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, id: &str) -> HistoryRecord {
        HistoryRecord {
            title: title.into(),
            rate: 8.1,
            count: 12000,
            kind: "movie".into(),
            genres: "剧情".into(),
            year: Some("2023".into()),
            poster: None,
            overview: None,
            tmdbid: Some(42),
            doubanid: id.into(),
            time: now_label(),
            tip: String::new(),
            unique: unique_key(title, id),
        }
    }

    #[test]
    fn test_unique_key_format() {
        assert_eq!(unique_key("流浪地球", "26266893"), "doubanrank: 流浪地球 (DB:26266893)");
    }

    #[test]
    fn test_delete_entry() {
        let mut history = vec![record("A", "1"), record("B", "2")];
        assert!(contains(&history, &unique_key("A", "1")));
        assert_eq!(delete_history_entry(&mut history, &unique_key("A", "1")), 1);
        assert_eq!(history.len(), 1);
        assert!(!contains(&history, &unique_key("A", "1")));
        assert_eq!(delete_history_entry(&mut history, "missing"), 0);
    }

    #[test]
    fn test_record_serializes_type_field() {
        let json = serde_json::to_value(record("A", "1")).unwrap();
        assert_eq!(json["type"], "movie");
        assert_eq!(json["unique"], "doubanrank: A (DB:1)");
    }
}

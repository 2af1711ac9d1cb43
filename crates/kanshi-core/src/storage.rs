use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::KanshiError;
use crate::rank::{CachedFeed, HistoryRecord, HISTORY_KEY};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

/// Namespace of the rank subscriber's records.
pub const RANK_PLUGIN: &str = "doubanrank";

/// SQLite-backed key-value store. Values are JSON documents.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, KanshiError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, KanshiError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    // ── Raw key-value access ────────────────────────────────────

    pub fn get_data<T: DeserializeOwned>(
        &self,
        plugin: &str,
        key: &str,
    ) -> Result<Option<T>, KanshiError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM plugin_data WHERE plugin = ?1 AND key = ?2",
                params![plugin, key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn save_data<T: Serialize + ?Sized>(
        &self,
        plugin: &str,
        key: &str,
        value: &T,
    ) -> Result<(), KanshiError> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO plugin_data (plugin, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(plugin, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![plugin, key, text],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete_data(&self, plugin: &str, key: &str) -> Result<bool, KanshiError> {
        let removed = self.conn.execute(
            "DELETE FROM plugin_data WHERE plugin = ?1 AND key = ?2",
            params![plugin, key],
        )?;
        Ok(removed > 0)
    }

    // ── Rank subscriber ─────────────────────────────────────────

    /// Subscription history; `None` when nothing was ever saved.
    pub fn history(&self) -> Result<Option<Vec<HistoryRecord>>, KanshiError> {
        self.get_data(RANK_PLUGIN, HISTORY_KEY)
    }

    pub fn save_history(&self, history: &[HistoryRecord]) -> Result<(), KanshiError> {
        self.save_data(RANK_PLUGIN, HISTORY_KEY, history)
    }

    pub fn cached_feed(&self, feed: &str) -> Result<Option<CachedFeed>, KanshiError> {
        self.get_data(RANK_PLUGIN, feed)
    }

    pub fn save_cached_feed(&self, feed: &str, cached: &CachedFeed) -> Result<(), KanshiError> {
        self.save_data(RANK_PLUGIN, feed, cached)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), KanshiError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, id: &str) -> HistoryRecord {
        HistoryRecord {
            title: title.into(),
            rate: 8.1,
            count: 12000,
            kind: "movie".into(),
            genres: "科幻 冒险".into(),
            year: Some("2021".into()),
            poster: None,
            overview: None,
            tmdbid: Some(438631),
            doubanid: id.into(),
            time: "10-17 08:00".into(),
            tip: String::new(),
            unique: crate::rank::unique_key(title, id),
        }
    }

    #[test]
    fn test_missing_key_is_none() {
        let storage = Storage::open_memory().unwrap();
        let value: Option<serde_json::Value> = storage.get_data("x", "y").unwrap();
        assert!(value.is_none());
        assert!(storage.history().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let storage = Storage::open_memory().unwrap();
        storage.save_data("p", "k", &json!({"a": 1})).unwrap();
        storage.save_data("p", "k", &json!({"a": 2})).unwrap();
        let value: serde_json::Value = storage.get_data("p", "k").unwrap().unwrap();
        assert_eq!(value["a"], 2);
    }

    #[test]
    fn test_plugins_are_namespaced() {
        let storage = Storage::open_memory().unwrap();
        storage.save_data("one", "k", &1).unwrap();
        storage.save_data("two", "k", &2).unwrap();
        assert_eq!(storage.get_data::<i32>("one", "k").unwrap(), Some(1));
        assert!(storage.delete_data("one", "k").unwrap());
        assert!(!storage.delete_data("one", "k").unwrap());
        assert_eq!(storage.get_data::<i32>("two", "k").unwrap(), Some(2));
    }

    #[test]
    fn test_history_roundtrip() {
        let storage = Storage::open_memory().unwrap();
        let history = vec![record("沙丘", "3001114"), record("奥本海默", "35593344")];
        storage.save_history(&history).unwrap();
        assert_eq!(storage.history().unwrap().unwrap(), history);
    }

    #[test]
    fn test_cached_feed() {
        let storage = Storage::open_memory().unwrap();
        let cached = CachedFeed::new(vec![json!({"id": "1"})], 1_700_000_000.0);
        storage.save_cached_feed("movie_top250", &cached).unwrap();
        let loaded = storage.cached_feed("movie_top250").unwrap().unwrap();
        assert_eq!(loaded.data.len(), 1);
        assert_eq!(loaded.timestamp, 1_700_000_000.0);
        assert!(storage.cached_feed("tv_animation").unwrap().is_none());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kanshi.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.save_history(&[record("沙丘", "3001114")]).unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.history().unwrap().unwrap().len(), 1);
    }
}

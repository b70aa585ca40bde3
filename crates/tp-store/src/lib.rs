//! Durable storage for tabpulse.
//!
//! A single `kv` table stands in for the extension's key-value storage area:
//! every value is a JSON document under a well-known key. Writes of several
//! keys go through one transaction, so the queue and the statistics derived
//! from it never disagree on disk.
//!
//! # Thread Safety
//!
//! [`Store`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The agent owns exactly one `Store` inside its actor task; nothing else
//! writes to it.
//!
//! # Keys
//!
//! | key | value |
//! |---|---|
//! | `event_queue` | JSON array of pending events, oldest first |
//! | `installation_id` | JSON string, hyphenated UUID |
//! | `activity_stats` | JSON object with `events_tracked` and `domains` |
//! | `tracking_enabled` | JSON boolean |

mod identity;

use std::collections::HashMap;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tp_core::{ActivityStats, Event, ValidationError};

pub use identity::{load_identity, load_or_create_identity};

/// Well-known storage keys.
pub mod keys {
    pub const EVENT_QUEUE: &str = "event_queue";
    pub const INSTALLATION_ID: &str = "installation_id";
    pub const ACTIVITY_STATS: &str = "activity_stats";
    pub const TRACKING_ENABLED: &str = "tracking_enabled";
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A value could not be encoded as JSON.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A stored value is not valid JSON for its key.
    #[error("invalid stored value for {key}: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A stored value parsed but failed validation.
    #[error("invalid stored value for {key}: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// Agent state restored from the store at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Unacknowledged events, oldest first.
    pub queue: Vec<Event>,
    pub stats: ActivityStats,
    pub tracking_enabled: bool,
}

/// Key-value store backed by SQLite.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens a store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory store.
    ///
    /// Useful for testing. The data is gone when the connection closes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")?;
        self.conn.execute_batch(
            "
            -- value: JSON document
            -- updated_at: ISO 8601 (e.g., '2024-01-15T10:30:00.000Z')
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads several keys at once. Missing keys are absent from the map.
    pub fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT key, value FROM kv WHERE key IN ({placeholders})"))?;
        let rows = stmt.query_map(params_from_iter(keys.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// Reads a single key.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Writes several keys in one transaction.
    pub fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                ",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Writes a single key.
    pub fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.set_many(&[(key, value)])
    }

    /// Loads everything the agent restores at startup in one query.
    ///
    /// Missing keys fall back to an empty queue, empty statistics and
    /// tracking enabled.
    pub fn load_state(&self) -> Result<PersistedState, StoreError> {
        let values = self.get_many(&[
            keys::EVENT_QUEUE,
            keys::ACTIVITY_STATS,
            keys::TRACKING_ENABLED,
        ])?;
        Ok(PersistedState {
            queue: decode(keys::EVENT_QUEUE, &values)?.unwrap_or_default(),
            stats: decode(keys::ACTIVITY_STATS, &values)?.unwrap_or_default(),
            tracking_enabled: decode(keys::TRACKING_ENABLED, &values)?.unwrap_or(true),
        })
    }

    /// Replaces the persisted queue contents.
    pub fn save_queue<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<(), StoreError> {
        let value = encode_queue(events)?;
        self.set(keys::EVENT_QUEUE, value)
    }

    /// Replaces the queue and the activity statistics atomically.
    pub fn save_queue_and_stats<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a Event>,
        stats: &ActivityStats,
    ) -> Result<(), StoreError> {
        let queue = encode_queue(events)?;
        let stats = encode(keys::ACTIVITY_STATS, stats)?;
        self.set_many(&[(keys::EVENT_QUEUE, queue), (keys::ACTIVITY_STATS, stats)])
    }

    pub fn save_tracking_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        let value = encode(keys::TRACKING_ENABLED, &enabled)?;
        self.set(keys::TRACKING_ENABLED, value)
    }
}

fn decode<T: DeserializeOwned>(
    key: &'static str,
    values: &HashMap<String, String>,
) -> Result<Option<T>, StoreError> {
    values
        .get(key)
        .map(|raw| serde_json::from_str(raw).map_err(|source| StoreError::Decode { key, source }))
        .transpose()
}

fn encode<T: Serialize + ?Sized>(key: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { key, source })
}

fn encode_queue<'a>(events: impl IntoIterator<Item = &'a Event>) -> Result<String, StoreError> {
    let events: Vec<&Event> = events.into_iter().collect();
    encode(keys::EVENT_QUEUE, &events)
}

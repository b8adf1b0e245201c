//! Synchronous key-value persistence for engine records.
//!
//! Records are whole-blob JSON strings under fixed, versioned keys. The
//! engine never does partial-field updates; every mutation rewrites the
//! full record before control returns to the caller.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Key for the serialized `ProgressRecord`.
pub const PROGRESS_KEY: &str = "adhkar.progress.v1";

/// Key reserved for the settings blob. The blob's contents are owned by
/// the presentation layer and never read by the engine.
#[allow(dead_code)]
pub const SETTINGS_KEY: &str = "adhkar.settings.v1";

/// Key for the serialized `StreakRecord`.
pub const STREAK_KEY: &str = "adhkar.streak.v1";

/// Trait for local, synchronous, string-valued storage backends.
pub trait KvStore: Send + Sync {
  /// Read the value stored under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Write `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed store used by the real engine.
pub struct SqliteKvStore {
  conn: Mutex<Connection>,
}

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteKvStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&default_state_path()?)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create state directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open state database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run state migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl KvStore for SqliteKvStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM kv WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    // A missing row is an ordinary miss; anything else is a storage
    // failure and must surface.
    match stmt.query_row(params![key], |row| row.get(0)) {
      Ok(value) => Ok(Some(value)),
      Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
      Err(e) => Err(eyre!("Failed to read key {}: {}", key, e)),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryKvStore {
  map: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl KvStore for MemoryKvStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let map = self
      .map
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(map.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut map = self
      .map
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    map.insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// Default state database path under the platform data directory.
pub fn default_state_path() -> Result<std::path::PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("adhkar").join("state.db"))
}

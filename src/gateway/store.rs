//! Versioned asset containers behind a storage trait.
//!
//! A container is the set of entries sharing one version tag. Containers
//! materialize on first put and disappear when their last entry is
//! deleted, so enumeration reflects what is actually retained.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::types::ResponseSnapshot;

/// Trait for the platform cache store: versioned containers holding
/// request-identity → response-snapshot entries.
pub trait AssetStore: Send + Sync {
  /// Store a snapshot under (version, identity), replacing any previous
  /// entry for that identity.
  fn put(&self, version: &str, identity: &str, url: &str, snapshot: &ResponseSnapshot)
    -> Result<()>;

  /// Look up the snapshot for (version, identity).
  fn get(&self, version: &str, identity: &str) -> Result<Option<ResponseSnapshot>>;

  /// Names of all retained containers.
  fn versions(&self) -> Result<Vec<String>>;

  /// Delete a container and everything in it.
  fn delete_version(&self, version: &str) -> Result<()>;
}

/// SQLite-backed asset store.
pub struct SqliteAssetStore {
  conn: Mutex<Connection>,
}

/// Schema for the asset cache table.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS asset_cache (
    version TEXT NOT NULL,
    request_key TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (version, request_key)
);

CREATE INDEX IF NOT EXISTS idx_asset_cache_version ON asset_cache(version);
"#;

impl SqliteAssetStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&default_cache_path()?)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(ASSET_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl AssetStore for SqliteAssetStore {
  fn put(
    &self,
    version: &str,
    identity: &str,
    url: &str,
    snapshot: &ResponseSnapshot,
  ) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&snapshot.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO asset_cache (version, request_key, url, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![version, identity, url, snapshot.status, headers, snapshot.body],
      )
      .map_err(|e| eyre!("Failed to store cache entry for {}: {}", url, e))?;

    Ok(())
  }

  fn get(&self, version: &str, identity: &str) -> Result<Option<ResponseSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT status, headers, body FROM asset_cache WHERE version = ? AND request_key = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    // A missing row is an ordinary miss; anything else is a storage
    // failure and must surface.
    let row: Option<(u16, String, Vec<u8>)> = match stmt
      .query_row(params![version, identity], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      }) {
      Ok(row) => Some(row),
      Err(rusqlite::Error::QueryReturnedNoRows) => None,
      Err(e) => return Err(eyre!("Failed to read cache entry: {}", e)),
    };

    match row {
      Some((status, headers_raw, body)) => {
        let headers = serde_json::from_str(&headers_raw)
          .map_err(|e| eyre!("Failed to parse stored headers: {}", e))?;
        Ok(Some(ResponseSnapshot {
          status,
          headers,
          body,
        }))
      }
      None => Ok(None),
    }
  }

  fn versions(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT version FROM asset_cache ORDER BY version")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let versions = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache versions: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(versions)
  }

  fn delete_version(&self, version: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM asset_cache WHERE version = ?", params![version])
      .map_err(|e| eyre!("Failed to delete cache version {}: {}", version, e))?;

    Ok(())
  }
}

/// In-memory asset store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryAssetStore {
  containers: Mutex<HashMap<String, HashMap<String, ResponseSnapshot>>>,
}

#[cfg(test)]
impl AssetStore for MemoryAssetStore {
  fn put(
    &self,
    version: &str,
    identity: &str,
    _url: &str,
    snapshot: &ResponseSnapshot,
  ) -> Result<()> {
    let mut containers = self
      .containers
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    containers
      .entry(version.to_string())
      .or_default()
      .insert(identity.to_string(), snapshot.clone());
    Ok(())
  }

  fn get(&self, version: &str, identity: &str) -> Result<Option<ResponseSnapshot>> {
    let containers = self
      .containers
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      containers
        .get(version)
        .and_then(|c| c.get(identity))
        .cloned(),
    )
  }

  fn versions(&self) -> Result<Vec<String>> {
    let containers = self
      .containers
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut versions: Vec<String> = containers.keys().cloned().collect();
    versions.sort();
    Ok(versions)
  }

  fn delete_version(&self, version: &str) -> Result<()> {
    let mut containers = self
      .containers
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    containers.remove(version);
    Ok(())
  }
}

/// Default cache database path under the platform data directory.
pub fn default_cache_path() -> Result<std::path::PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("adhkar").join("cache.db"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snapshot(status: u16, body: &[u8]) -> ResponseSnapshot {
    ResponseSnapshot {
      status,
      headers: vec![("content-type".to_string(), "text/css".to_string())],
      body: body.to_vec(),
    }
  }

  fn sqlite_store() -> SqliteAssetStore {
    let conn = Connection::open_in_memory().unwrap();
    SqliteAssetStore::from_connection(conn).unwrap()
  }

  #[test]
  fn test_sqlite_round_trip() {
    let store = sqlite_store();
    let snap = snapshot(200, b"body { margin: 0 }");
    store.put("v3", "key1", "https://e/a.css", &snap).unwrap();
    assert_eq!(store.get("v3", "key1").unwrap(), Some(snap));
    assert_eq!(store.get("v2", "key1").unwrap(), None);
  }

  #[test]
  fn test_sqlite_put_replaces_same_identity() {
    let store = sqlite_store();
    store.put("v3", "key1", "https://e/a", &snapshot(200, b"old")).unwrap();
    store.put("v3", "key1", "https://e/a", &snapshot(200, b"new")).unwrap();
    assert_eq!(store.get("v3", "key1").unwrap().unwrap().body, b"new");
  }

  #[test]
  fn test_sqlite_versions_and_delete() {
    let store = sqlite_store();
    store.put("v2", "k", "u", &snapshot(200, b"x")).unwrap();
    store.put("v3", "k", "u", &snapshot(200, b"y")).unwrap();
    assert_eq!(store.versions().unwrap(), vec!["v2", "v3"]);

    store.delete_version("v2").unwrap();
    assert_eq!(store.versions().unwrap(), vec!["v3"]);
    assert_eq!(store.get("v2", "k").unwrap(), None);
  }

  #[test]
  fn test_sqlite_unreadable_row_surfaces_as_error() {
    let store = sqlite_store();
    // A blob in the status column cannot be read back as a number; that
    // is a storage failure, while an absent row stays a plain miss.
    store
      .conn
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO asset_cache (version, request_key, url, status, headers, body, cached_at)
         VALUES ('v3', 'k', 'u', ?, '[]', x'00', datetime('now'))",
        params![vec![0u8, 1]],
      )
      .unwrap();

    assert!(store.get("v3", "k").is_err());
    assert_eq!(store.get("v3", "other").unwrap(), None);
  }

  #[test]
  fn test_memory_store_matches_sqlite_semantics() {
    let store = MemoryAssetStore::default();
    store.put("v2", "k", "u", &snapshot(200, b"x")).unwrap();
    store.put("v3", "k", "u", &snapshot(200, b"y")).unwrap();
    assert_eq!(store.versions().unwrap(), vec!["v2", "v3"]);
    store.delete_version("v3").unwrap();
    assert_eq!(store.get("v3", "k").unwrap(), None);
    assert!(store.get("v2", "k").unwrap().is_some());
  }
}

//! Asset storage trait and SQLite implementation.
//!
//! Cached shell assets live in their own database file (`shell.db`), keyed
//! by `(generation, path)`. The entry store never touches this file.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::CacheError;

/// A cached copy of one shell asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
  /// Path relative to the application origin, e.g. `/app.js`.
  pub path: String,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

/// Trait for asset cache backends.
pub trait AssetStorage: Send + Sync {
  /// Store one asset under a generation, overwriting any existing copy.
  fn put(&self, generation: &str, asset: &CachedAsset) -> Result<(), CacheError>;

  /// Store a whole manifest under a generation in one transaction.
  /// Either every asset lands or none does.
  fn put_generation(&self, generation: &str, assets: &[CachedAsset]) -> Result<(), CacheError>;

  /// Look up one asset under a generation.
  fn get(&self, generation: &str, path: &str) -> Result<Option<CachedAsset>, CacheError>;

  /// Every generation tag present in storage.
  fn list_generations(&self) -> Result<Vec<String>, CacheError>;

  /// Drop every asset stored under a generation.
  fn delete_generation(&self, generation: &str) -> Result<(), CacheError>;
}

impl<S: AssetStorage> AssetStorage for std::sync::Arc<S> {
  fn put(&self, generation: &str, asset: &CachedAsset) -> Result<(), CacheError> {
    (**self).put(generation, asset)
  }

  fn put_generation(&self, generation: &str, assets: &[CachedAsset]) -> Result<(), CacheError> {
    (**self).put_generation(generation, assets)
  }

  fn get(&self, generation: &str, path: &str) -> Result<Option<CachedAsset>, CacheError> {
    (**self).get(generation, path)
  }

  fn list_generations(&self) -> Result<Vec<String>, CacheError> {
    (**self).list_generations()
  }

  fn delete_generation(&self, generation: &str) -> Result<(), CacheError> {
    (**self).delete_generation(generation)
  }
}

const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS assets (
    generation TEXT NOT NULL,
    path TEXT NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, path)
);
"#;

/// SQLite-based asset cache.
pub struct SqliteAssetStorage {
  conn: Mutex<Connection>,
}

impl SqliteAssetStorage {
  /// Open or create the cache database at a specific path.
  pub fn open_at(path: &Path) -> Result<Self, CacheError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| CacheError::Storage(format!("create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| CacheError::Storage(format!("open {}: {}", path.display(), e)))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, CacheError> {
    let conn =
      Connection::open_in_memory().map_err(|e| CacheError::Storage(e.to_string()))?;
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn
      .execute_batch(ASSET_SCHEMA)
      .map_err(|e| CacheError::Storage(format!("create cache schema: {}", e)))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
    self
      .conn
      .lock()
      .map_err(|e| CacheError::Storage(format!("lock poisoned: {}", e)))
  }
}

impl AssetStorage for SqliteAssetStorage {
  fn put(&self, generation: &str, asset: &CachedAsset) -> Result<(), CacheError> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO assets (generation, path, content_type, body, fetched_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        params![generation, asset.path, asset.content_type, asset.body],
      )
      .map_err(|e| CacheError::Storage(format!("store asset: {}", e)))?;

    Ok(())
  }

  fn put_generation(&self, generation: &str, assets: &[CachedAsset]) -> Result<(), CacheError> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| CacheError::Storage(format!("begin transaction: {}", e)))?;

    for asset in assets {
      let stored = conn.execute(
        "INSERT OR REPLACE INTO assets (generation, path, content_type, body, fetched_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        params![generation, asset.path, asset.content_type, asset.body],
      );

      if let Err(e) = stored {
        let _ = conn.execute("ROLLBACK", []);
        return Err(CacheError::Storage(format!("store asset: {}", e)));
      }
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| CacheError::Storage(format!("commit transaction: {}", e)))?;

    Ok(())
  }

  fn get(&self, generation: &str, path: &str) -> Result<Option<CachedAsset>, CacheError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT content_type, body FROM assets
         WHERE generation = ?1 AND path = ?2",
      )
      .map_err(|e| CacheError::Storage(e.to_string()))?;

    // A real storage failure must not masquerade as a cache miss: only
    // "no rows" maps to None.
    let row: Option<(Option<String>, Vec<u8>)> = stmt
      .query_row(params![generation, path], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .optional()
      .map_err(|e| CacheError::Storage(format!("read asset: {}", e)))?;

    Ok(row.map(|(content_type, body)| CachedAsset {
      path: path.to_string(),
      content_type,
      body,
    }))
  }

  fn list_generations(&self) -> Result<Vec<String>, CacheError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT generation FROM assets ORDER BY generation")
      .map_err(|e| CacheError::Storage(e.to_string()))?;

    let tags = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| CacheError::Storage(e.to_string()))?
      .collect::<Result<Vec<String>, _>>()
      .map_err(|e| CacheError::Storage(e.to_string()))?;

    Ok(tags)
  }

  fn delete_generation(&self, generation: &str) -> Result<(), CacheError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM assets WHERE generation = ?1", params![generation])
      .map_err(|e| CacheError::Storage(e.to_string()))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn asset(path: &str, body: &[u8]) -> CachedAsset {
    CachedAsset {
      path: path.into(),
      content_type: Some("text/plain".into()),
      body: body.to_vec(),
    }
  }

  #[test]
  fn test_put_get_roundtrip() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage.put("v1", &asset("/a", b"aaa")).unwrap();

    let got = storage.get("v1", "/a").unwrap().unwrap();
    assert_eq!(got.body, b"aaa");
    assert_eq!(got.content_type.as_deref(), Some("text/plain"));
  }

  #[test]
  fn test_get_misses_across_generations() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage.put("v1", &asset("/a", b"aaa")).unwrap();

    assert!(storage.get("v2", "/a").unwrap().is_none());
  }

  #[test]
  fn test_put_overwrites_existing_copy() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage.put("v1", &asset("/a", b"old")).unwrap();
    storage.put("v1", &asset("/a", b"new")).unwrap();

    assert_eq!(storage.get("v1", "/a").unwrap().unwrap().body, b"new");
  }

  #[test]
  fn test_put_generation_stores_whole_manifest() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage
      .put_generation("v1", &[asset("/a", b"aaa"), asset("/b", b"bbb")])
      .unwrap();

    assert!(storage.get("v1", "/a").unwrap().is_some());
    assert!(storage.get("v1", "/b").unwrap().is_some());
  }

  #[test]
  fn test_get_surfaces_storage_errors_instead_of_missing() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage.put("v1", &asset("/a", b"aaa")).unwrap();

    // Break the database underneath the storage handle.
    storage
      .conn
      .lock()
      .unwrap()
      .execute_batch("DROP TABLE assets")
      .unwrap();

    let err = storage.get("v1", "/a").unwrap_err();
    assert!(matches!(err, CacheError::Storage(_)));
  }

  #[test]
  fn test_delete_generation_sweeps_only_that_tag() {
    let storage = SqliteAssetStorage::open_in_memory().unwrap();
    storage.put("v1", &asset("/a", b"aaa")).unwrap();
    storage.put("v2", &asset("/a", b"AAA")).unwrap();

    storage.delete_generation("v1").unwrap();

    assert!(storage.get("v1", "/a").unwrap().is_none());
    assert!(storage.get("v2", "/a").unwrap().is_some());
    assert_eq!(storage.list_generations().unwrap(), vec!["v2"]);
  }
}

//! Durable entry store backed by SQLite.
//!
//! Owns `ledger.db` exclusively. Records are keyed by `id` with a
//! non-unique index on `date` for period queries. Schema creation runs
//! once, guarded by `PRAGMA user_version`, so repeated launches are
//! idempotent.

pub mod entry;

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;
pub use entry::{fresh_id, LedgerEntry};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    investment INTEGER NOT NULL,
    payout INTEGER NOT NULL,
    memo TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
"#;

/// Durable CRUD for ledger entries.
pub struct EntryStore {
  conn: Mutex<Connection>,
}

impl EntryStore {
  /// Open or create the ledger database at a specific path.
  pub fn open_at(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StoreError::Unavailable(format!("create data directory: {}", e)))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| StoreError::Unavailable(format!("open {}: {}", path.display(), e)))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<(), StoreError> {
    let conn = self.lock()?;

    let version: i64 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| StoreError::Unavailable(format!("read schema version: {}", e)))?;

    if version < SCHEMA_VERSION {
      conn
        .execute_batch(SCHEMA)
        .map_err(|e| StoreError::Unavailable(format!("create schema: {}", e)))?;
      conn
        .pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| StoreError::Unavailable(format!("set schema version: {}", e)))?;
    }

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
  }

  /// Every record, in store order. Ordering is the caller's concern.
  pub fn list_all(&self) -> Result<Vec<LedgerEntry>, StoreError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT id, date, investment, payout, memo FROM entries")
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let rows = stmt
      .query_map([], row_to_entry)
      .map_err(|e| StoreError::Unavailable(e.to_string()))?
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    Ok(rows)
  }

  /// Records within `[from, to]`, via the date index, oldest first.
  pub fn list_between(
    &self,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
  ) -> Result<Vec<LedgerEntry>, StoreError> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT id, date, investment, payout, memo FROM entries
         WHERE date >= ?1 AND date <= ?2
         ORDER BY date",
      )
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let rows = stmt
      .query_map(params![from.to_string(), to.to_string()], row_to_entry)
      .map_err(|e| StoreError::Unavailable(e.to_string()))?
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    Ok(rows)
  }

  /// Insert if the id is absent, replace if present. Atomic: readers see
  /// the whole old record or the whole new one, never a partial write.
  pub fn upsert(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries (id, date, investment, payout, memo)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
          entry.id,
          entry.date.to_string(),
          entry.investment,
          entry.payout,
          entry.memo
        ],
      )
      .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

    Ok(())
  }

  /// Remove the record with that id. No-op when absent.
  pub fn delete(&self, id: &str) -> Result<(), StoreError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM entries WHERE id = ?1", params![id])
      .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

    Ok(())
  }

  /// Remove every record. Irreversible.
  pub fn clear_all(&self) -> Result<(), StoreError> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM entries", [])
      .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

    Ok(())
  }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
  let date_text: String = row.get(1)?;
  let date = date_text.parse().map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
  })?;

  Ok(LedgerEntry {
    id: row.get(0)?,
    date,
    investment: row.get(2)?,
    payout: row.get(3)?,
    memo: row.get(4)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> chrono::NaiveDate {
    s.parse().unwrap()
  }

  fn entry(id: &str, d: &str, inv: u64, pay: u64, memo: &str) -> LedgerEntry {
    LedgerEntry {
      id: id.into(),
      date: date(d),
      investment: inv,
      payout: pay,
      memo: memo.into(),
    }
  }

  #[test]
  fn test_upsert_then_list_contains_entry() {
    let store = EntryStore::open_in_memory().unwrap();
    let e = entry("a", "2024-05-01", 1000, 3000, "x");
    store.upsert(&e).unwrap();

    let all = store.list_all().unwrap();
    assert_eq!(all, vec![e.clone()]);
    assert_eq!(all[0].profit(), 2000);
  }

  #[test]
  fn test_upsert_same_id_replaces_without_duplicate() {
    let store = EntryStore::open_in_memory().unwrap();
    store.upsert(&entry("a", "2024-05-01", 1000, 3000, "x")).unwrap();
    store.upsert(&entry("a", "2024-05-02", 2000, 500, "y")).unwrap();

    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].date, date("2024-05-02"));
    assert_eq!(all[0].investment, 2000);
    assert_eq!(all[0].memo, "y");
  }

  #[test]
  fn test_delete_missing_id_is_noop() {
    let store = EntryStore::open_in_memory().unwrap();
    store.upsert(&entry("a", "2024-05-01", 1, 2, "")).unwrap();

    store.delete("nope").unwrap();
    assert_eq!(store.list_all().unwrap().len(), 1);
  }

  #[test]
  fn test_delete_removes_record() {
    let store = EntryStore::open_in_memory().unwrap();
    store.upsert(&entry("a", "2024-05-01", 1, 2, "")).unwrap();
    store.upsert(&entry("b", "2024-05-02", 3, 4, "")).unwrap();

    store.delete("a").unwrap();
    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "b");
  }

  #[test]
  fn test_clear_all_empties_store() {
    let store = EntryStore::open_in_memory().unwrap();
    store.upsert(&entry("a", "2024-05-01", 1, 2, "")).unwrap();
    store.upsert(&entry("b", "2024-06-01", 3, 4, "")).unwrap();

    store.clear_all().unwrap();
    assert!(store.list_all().unwrap().is_empty());
  }

  #[test]
  fn test_list_between_uses_date_bounds() {
    let store = EntryStore::open_in_memory().unwrap();
    store.upsert(&entry("a", "2024-04-30", 1, 2, "")).unwrap();
    store.upsert(&entry("b", "2024-05-01", 1, 2, "")).unwrap();
    store.upsert(&entry("c", "2024-05-31", 1, 2, "")).unwrap();
    store.upsert(&entry("d", "2024-06-01", 1, 2, "")).unwrap();

    let may = store
      .list_between(date("2024-05-01"), date("2024-05-31"))
      .unwrap();
    let ids: Vec<_> = may.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
  }

  #[test]
  fn test_reopen_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    {
      let store = EntryStore::open_at(&path).unwrap();
      store.upsert(&entry("a", "2024-05-01", 100, 200, "keep")).unwrap();
    }

    let store = EntryStore::open_at(&path).unwrap();
    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].memo, "keep");
  }
}

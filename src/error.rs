//! Error types for the ledger core.
//!
//! The library layer is typed; the binary edge converts into
//! `color_eyre::Result` via `?`.

use thiserror::Error;

/// Errors from the durable entry store.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The database could not be opened or read. Every operation fails with
  /// this kind until the store is re-opened successfully.
  #[error("ledger storage unavailable: {0}")]
  Unavailable(String),

  /// A single write failed. The store stays usable; the caller may retry.
  #[error("ledger write failed: {0}")]
  WriteFailed(String),
}

/// Errors from the shell asset cache.
#[derive(Debug, Error)]
pub enum CacheError {
  /// One or more manifest assets could not be fetched during install.
  /// The new generation is discarded; the previous one stays active.
  #[error("shell install failed: {0}")]
  InstallFailed(String),

  /// The cache database rejected a read or write.
  #[error("shell cache storage error: {0}")]
  Storage(String),

  /// Network unreachable and nothing cached for the requested path.
  #[error("asset unreachable: {0}")]
  Unreachable(String),
}

/// Errors from backup/restore.
#[derive(Debug, Error)]
pub enum ExchangeError {
  /// The import payload is not an array of entry-like records.
  /// Nothing is written.
  #[error("import payload is not an entry array: {0}")]
  ImportFormatInvalid(String),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("serialize entries: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Errors from the PIN lock state file.
#[derive(Debug, Error)]
pub enum LockError {
  #[error("lock state unreadable: {0}")]
  Storage(String),

  /// PIN outside the accepted 4-8 digit format.
  #[error("PIN must be 4-8 digits")]
  BadPin,
}

impl From<std::io::Error> for LockError {
  fn from(err: std::io::Error) -> Self {
    LockError::Storage(err.to_string())
  }
}

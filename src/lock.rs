//! PIN lock collaborator.
//!
//! Opaque boolean gate in front of the ledger: a salted SHA-256 hash of a
//! 4-8 digit PIN, persisted as a small JSON state file. The rest of the
//! system only ever asks `is_enabled` and `verify`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::LockError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LockState {
  pin_salt: Option<String>,
  pin_hash: Option<String>,
}

/// PIN gate backed by a state file.
pub struct PinLock {
  path: PathBuf,
}

impl PinLock {
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Set (or replace) the PIN. Enables the lock.
  pub fn set_pin(&self, pin: &str) -> Result<(), LockError> {
    if !pin_format_ok(pin) {
      return Err(LockError::BadPin);
    }

    let salt = Uuid::new_v4().simple().to_string();
    let state = LockState {
      pin_hash: Some(digest(&salt, pin)),
      pin_salt: Some(salt),
    };
    self.save(&state)
  }

  /// Remove the PIN. Disables the lock.
  pub fn clear_pin(&self) -> Result<(), LockError> {
    self.save(&LockState::default())
  }

  /// Whether a PIN is set.
  pub fn is_enabled(&self) -> Result<bool, LockError> {
    Ok(self.load()?.pin_hash.is_some())
  }

  /// Check a PIN against the stored hash. False when no PIN is set.
  pub fn verify(&self, pin: &str) -> Result<bool, LockError> {
    let state = self.load()?;
    match (state.pin_salt, state.pin_hash) {
      (Some(salt), Some(hash)) => Ok(digest(&salt, pin) == hash),
      _ => Ok(false),
    }
  }

  fn load(&self) -> Result<LockState, LockError> {
    if !self.path.exists() {
      return Ok(LockState::default());
    }

    let text = std::fs::read_to_string(&self.path)?;
    serde_json::from_str(&text).map_err(|e| LockError::Storage(e.to_string()))
  }

  fn save(&self, state: &LockState) -> Result<(), LockError> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let text =
      serde_json::to_string_pretty(state).map_err(|e| LockError::Storage(e.to_string()))?;
    std::fs::write(&self.path, text)?;
    Ok(())
  }
}

fn pin_format_ok(pin: &str) -> bool {
  (4..=8).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

fn digest(salt: &str, pin: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(format!("{}:{}", salt, pin).as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lock_in(dir: &tempfile::TempDir) -> PinLock {
    PinLock::at(dir.path().join("lock.json"))
  }

  #[test]
  fn test_set_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    let lock = lock_in(&dir);

    lock.set_pin("123456").unwrap();
    assert!(lock.is_enabled().unwrap());
    assert!(lock.verify("123456").unwrap());
    assert!(!lock.verify("654321").unwrap());
  }

  #[test]
  fn test_verify_without_pin_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let lock = lock_in(&dir);

    assert!(!lock.is_enabled().unwrap());
    assert!(!lock.verify("1234").unwrap());
  }

  #[test]
  fn test_clear_pin_disables_lock() {
    let dir = tempfile::tempdir().unwrap();
    let lock = lock_in(&dir);

    lock.set_pin("1234").unwrap();
    lock.clear_pin().unwrap();
    assert!(!lock.is_enabled().unwrap());
    assert!(!lock.verify("1234").unwrap());
  }

  #[test]
  fn test_pin_format_rules() {
    let dir = tempfile::tempdir().unwrap();
    let lock = lock_in(&dir);

    assert!(matches!(lock.set_pin("123"), Err(LockError::BadPin)));
    assert!(matches!(lock.set_pin("123456789"), Err(LockError::BadPin)));
    assert!(matches!(lock.set_pin("12ab"), Err(LockError::BadPin)));
    assert!(lock.set_pin("1234").is_ok());
  }
}

//! The ledger entry record type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded session: date, money in, money out, optional note.
///
/// `investment` and `payout` are unsigned so the non-negativity invariant
/// holds by construction. Profit is derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
  /// Primary key. Re-saving with an existing id replaces the record.
  pub id: String,
  /// Session date, ISO `YYYY-MM-DD`.
  pub date: NaiveDate,
  /// Money put in, in yen.
  pub investment: u64,
  /// Money returned, in yen.
  pub payout: u64,
  #[serde(default)]
  pub memo: String,
}

impl LedgerEntry {
  /// Create a new entry with a fresh id.
  pub fn new(date: NaiveDate, investment: u64, payout: u64, memo: impl Into<String>) -> Self {
    Self {
      id: fresh_id(),
      date,
      investment,
      payout,
      memo: memo.into(),
    }
  }

  /// Payout minus investment. May be negative.
  pub fn profit(&self) -> i64 {
    self.payout as i64 - self.investment as i64
  }

  /// `YYYY-MM` key for monthly grouping.
  pub fn month_key(&self) -> String {
    self.date.format("%Y-%m").to_string()
  }

  /// `YYYY` key for yearly grouping.
  pub fn year_key(&self) -> String {
    self.date.format("%Y").to_string()
  }
}

/// Generate an opaque unique identifier.
pub fn fresh_id() -> String {
  Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  #[test]
  fn test_profit_can_be_negative() {
    let e = LedgerEntry::new(date("2024-05-01"), 3000, 1000, "");
    assert_eq!(e.profit(), -2000);
  }

  #[test]
  fn test_profit_derivation() {
    let e = LedgerEntry::new(date("2024-05-01"), 1000, 3000, "x");
    assert_eq!(e.profit(), 2000);
  }

  #[test]
  fn test_month_and_year_keys() {
    let e = LedgerEntry::new(date("2024-05-01"), 0, 0, "");
    assert_eq!(e.month_key(), "2024-05");
    assert_eq!(e.year_key(), "2024");
  }

  #[test]
  fn test_fresh_ids_are_unique() {
    assert_ne!(fresh_id(), fresh_id());
  }

  #[test]
  fn test_serde_field_names() {
    let e = LedgerEntry {
      id: "a".into(),
      date: date("2024-05-01"),
      investment: 1000,
      payout: 3000,
      memo: "x".into(),
    };
    let v = serde_json::to_value(&e).unwrap();
    assert_eq!(v["id"], "a");
    assert_eq!(v["date"], "2024-05-01");
    assert_eq!(v["investment"], 1000);
    assert_eq!(v["payout"], 3000);
    assert_eq!(v["memo"], "x");
  }
}

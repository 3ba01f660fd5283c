//! Backup and restore: JSON both ways, CSV out.
//!
//! Import is tolerant per row and strict at the top level: anything that
//! is not an array is rejected wholesale before any write. Rows missing a
//! date are skipped; rows missing an id get a fresh one; money fields are
//! coerced to non-negative integers.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::store::{fresh_id, EntryStore, LedgerEntry};

/// Outcome of a restore run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
  pub imported: usize,
  pub skipped: usize,
}

/// Serialize all entries as a pretty-printed JSON array.
pub fn export_json(entries: &[LedgerEntry]) -> Result<String, ExchangeError> {
  Ok(serde_json::to_string_pretty(entries)?)
}

/// Restore entries from a JSON array, upserting each valid row.
pub fn import_json(store: &EntryStore, text: &str) -> Result<ImportReport, ExchangeError> {
  let value: Value = serde_json::from_str(text)
    .map_err(|e| ExchangeError::ImportFormatInvalid(e.to_string()))?;

  let rows = value
    .as_array()
    .ok_or_else(|| ExchangeError::ImportFormatInvalid("top level must be an array".into()))?;

  let mut report = ImportReport {
    imported: 0,
    skipped: 0,
  };

  for row in rows {
    let Some(obj) = row.as_object() else {
      warn!("skipping non-object import row");
      report.skipped += 1;
      continue;
    };

    // No date, no row.
    let date: Option<NaiveDate> = obj
      .get("date")
      .and_then(Value::as_str)
      .and_then(|s| s.parse().ok());
    let Some(date) = date else {
      debug!("skipping import row without a valid date");
      report.skipped += 1;
      continue;
    };

    let id = match obj.get("id").and_then(Value::as_str) {
      Some(id) if !id.is_empty() => id.to_string(),
      _ => fresh_id(),
    };

    let entry = LedgerEntry {
      id,
      date,
      investment: coerce_amount(obj.get("investment")),
      payout: coerce_amount(obj.get("payout")),
      memo: obj
        .get("memo")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string(),
    };

    store.upsert(&entry)?;
    report.imported += 1;
  }

  Ok(report)
}

/// Coerce a JSON value to a non-negative integer amount.
/// Absent, negative or non-numeric values become 0.
fn coerce_amount(value: Option<&Value>) -> u64 {
  match value {
    Some(v) => {
      if let Some(u) = v.as_u64() {
        u
      } else if let Some(i) = v.as_i64() {
        i.max(0) as u64
      } else if let Some(f) = v.as_f64() {
        if f > 0.0 {
          f.round() as u64
        } else {
          0
        }
      } else if let Some(s) = v.as_str() {
        s.trim().parse::<i64>().map(|i| i.max(0) as u64).unwrap_or(0)
      } else {
        0
      }
    }
    None => 0,
  }
}

const CSV_HEADER: [&str; 5] = ["日付", "投資", "回収", "収支", "メモ"];

/// Render all entries as CSV, oldest first, every field double-quoted.
pub fn export_csv(entries: &[LedgerEntry]) -> String {
  let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
  ordered.sort_by(|a, b| a.date.cmp(&b.date));

  let mut rows = Vec::with_capacity(ordered.len() + 1);
  rows.push(CSV_HEADER.map(csv_quote).join(","));

  for entry in ordered {
    let fields = [
      entry.date.to_string(),
      entry.investment.to_string(),
      entry.payout.to_string(),
      entry.profit().to_string(),
      entry.memo.clone(),
    ];
    rows.push(fields.map(|f| csv_quote(&f)).join(","));
  }

  rows.join("\n")
}

fn csv_quote(field: &str) -> String {
  format!("\"{}\"", field.replace('"', "\"\""))
}

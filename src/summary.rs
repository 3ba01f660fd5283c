//! Pure aggregation over ledger entries.
//!
//! No storage access here: callers pass the entries in and get values
//! back, so the store stays the only stateful component.

use std::collections::BTreeMap;

use crate::store::LedgerEntry;

/// Overall statistics across a set of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
  pub profit: i64,
  pub sessions: usize,
  pub wins: usize,
  pub investment: u64,
  pub payout: u64,
}

impl Totals {
  pub fn compute(entries: &[LedgerEntry]) -> Self {
    let mut totals = Totals::default();
    for e in entries {
      totals.profit += e.profit();
      totals.sessions += 1;
      if e.profit() > 0 {
        totals.wins += 1;
      }
      totals.investment += e.investment;
      totals.payout += e.payout;
    }
    totals
  }

  /// Winning sessions as a percentage, 0.0 when empty.
  pub fn win_rate(&self) -> f64 {
    if self.sessions == 0 {
      0.0
    } else {
      self.wins as f64 / self.sessions as f64 * 100.0
    }
  }

  pub fn avg_investment(&self) -> u64 {
    if self.sessions == 0 {
      0
    } else {
      (self.investment as f64 / self.sessions as f64).round() as u64
    }
  }

  pub fn avg_payout(&self) -> u64 {
    if self.sessions == 0 {
      0
    } else {
      (self.payout as f64 / self.sessions as f64).round() as u64
    }
  }
}

/// Per-month aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthTotals {
  pub investment: u64,
  pub payout: u64,
  pub profit: i64,
  pub count: usize,
  pub wins: usize,
}

impl MonthTotals {
  pub fn win_rate(&self) -> f64 {
    if self.count == 0 {
      0.0
    } else {
      self.wins as f64 / self.count as f64 * 100.0
    }
  }
}

/// Group entries by `YYYY-MM`, keyed in ascending month order.
pub fn monthly_rollup(entries: &[LedgerEntry]) -> BTreeMap<String, MonthTotals> {
  let mut map: BTreeMap<String, MonthTotals> = BTreeMap::new();
  for e in entries {
    let totals = map.entry(e.month_key()).or_default();
    totals.investment += e.investment;
    totals.payout += e.payout;
    let p = e.profit();
    totals.profit += p;
    totals.count += 1;
    if p > 0 {
      totals.wins += 1;
    }
  }
  map
}

/// Profit per `YYYY` year, keyed in ascending order.
pub fn yearly_profit(entries: &[LedgerEntry]) -> BTreeMap<String, i64> {
  let mut map: BTreeMap<String, i64> = BTreeMap::new();
  for e in entries {
    *map.entry(e.year_key()).or_default() += e.profit();
  }
  map
}

/// Year/month period filter. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodFilter {
  /// `YYYY`
  pub year: Option<String>,
  /// `YYYY-MM`
  pub month: Option<String>,
}

impl PeriodFilter {
  /// Keep matching entries, newest first.
  pub fn apply(&self, mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    entries.retain(|e| {
      if let Some(year) = &self.year {
        if &e.year_key() != year {
          return false;
        }
      }
      if let Some(month) = &self.month {
        if &e.month_key() != month {
          return false;
        }
      }
      true
    });
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::entry::LedgerEntry;

  fn entry(d: &str, inv: u64, pay: u64) -> LedgerEntry {
    LedgerEntry::new(d.parse().unwrap(), inv, pay, "")
  }

  #[test]
  fn test_totals_over_mixed_sessions() {
    let entries = vec![
      entry("2024-05-01", 1000, 3000),
      entry("2024-05-02", 2000, 500),
      entry("2024-06-01", 1000, 1000),
    ];

    let t = Totals::compute(&entries);
    assert_eq!(t.profit, 500);
    assert_eq!(t.sessions, 3);
    assert_eq!(t.wins, 1);
    assert!((t.win_rate() - 33.333).abs() < 0.01);
    assert_eq!(t.avg_investment(), 1333);
    assert_eq!(t.avg_payout(), 1500);
  }

  #[test]
  fn test_totals_empty() {
    let t = Totals::compute(&[]);
    assert_eq!(t.win_rate(), 0.0);
    assert_eq!(t.avg_investment(), 0);
  }

  #[test]
  fn test_monthly_rollup_groups_and_counts_wins() {
    let entries = vec![
      entry("2024-05-01", 1000, 3000),
      entry("2024-05-20", 2000, 500),
      entry("2024-06-01", 100, 0),
    ];

    let rollup = monthly_rollup(&entries);
    assert_eq!(rollup.len(), 2);

    let may = &rollup["2024-05"];
    assert_eq!(may.investment, 3000);
    assert_eq!(may.payout, 3500);
    assert_eq!(may.profit, 500);
    assert_eq!(may.count, 2);
    assert_eq!(may.wins, 1);

    assert_eq!(rollup["2024-06"].profit, -100);
  }

  #[test]
  fn test_yearly_profit_groups_by_year() {
    let entries = vec![
      entry("2023-12-31", 0, 100),
      entry("2024-01-01", 100, 0),
      entry("2024-02-01", 0, 300),
    ];

    let by_year = yearly_profit(&entries);
    assert_eq!(by_year["2023"], 100);
    assert_eq!(by_year["2024"], 200);
  }

  #[test]
  fn test_period_filter_by_month_sorts_newest_first() {
    let entries = vec![
      entry("2024-05-01", 0, 0),
      entry("2024-05-20", 0, 0),
      entry("2024-06-01", 0, 0),
    ];

    let filter = PeriodFilter {
      year: None,
      month: Some("2024-05".into()),
    };
    let out = filter.apply(entries);
    let dates: Vec<String> = out.iter().map(|e| e.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-05-20", "2024-05-01"]);
  }

  #[test]
  fn test_period_filter_by_year() {
    let entries = vec![entry("2023-05-01", 0, 0), entry("2024-05-01", 0, 0)];

    let filter = PeriodFilter {
      year: Some("2023".into()),
      month: None,
    };
    let out = filter.apply(entries);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].year_key(), "2023");
  }
}

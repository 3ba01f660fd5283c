mod cache;
mod config;
mod error;
mod exchange;
mod lock;
mod store;
mod summary;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cache::{HttpFetcher, ShellCache, SqliteAssetStorage};
use config::Config;
use exchange::{export_csv, export_json, import_json};
use lock::PinLock;
use store::{EntryStore, LedgerEntry};
use summary::{monthly_rollup, yearly_profit, PeriodFilter, Totals};

#[derive(Parser, Debug)]
#[command(name = "slotbook")]
#[command(about = "An offline-first pachislot session ledger")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./slotbook.yaml, then
  /// $XDG_CONFIG_HOME/slotbook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// PIN, required for ledger commands while the lock is enabled
  #[arg(long, global = true)]
  pin: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Record a session
  Add {
    /// Session date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Money put in, yen
    #[arg(long)]
    investment: u64,
    /// Money returned, yen
    #[arg(long)]
    payout: u64,
    #[arg(long, default_value = "")]
    memo: String,
  },
  /// List sessions, newest first
  List {
    /// Only this year (YYYY)
    #[arg(long)]
    year: Option<String>,
    /// Only this month (YYYY-MM)
    #[arg(long)]
    month: Option<String>,
  },
  /// Delete a session by id
  Delete { id: String },
  /// Delete every session
  Wipe {
    /// Confirm the irreversible wipe
    #[arg(long)]
    yes: bool,
  },
  /// Overall and monthly statistics
  Summary {
    /// Show profit by year instead of by month
    #[arg(long)]
    yearly: bool,
  },
  /// Write all sessions as CSV
  ExportCsv {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Write all sessions as a JSON backup
  Backup {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Restore sessions from a JSON backup
  Restore { input: PathBuf },
  /// Manage the PIN lock
  Lock {
    #[command(subcommand)]
    action: LockAction,
  },
  /// Manage the offline shell cache
  Shell {
    #[command(subcommand)]
    action: ShellAction,
  },
}

#[derive(Subcommand, Debug)]
enum LockAction {
  /// Set or replace the PIN (4-8 digits)
  SetPin { pin: String },
  /// Remove the PIN and disable the lock
  ClearPin,
  /// Show whether the lock is enabled
  Status,
}

#[derive(Subcommand, Debug)]
enum ShellAction {
  /// Fetch the whole manifest into a fresh generation and activate it
  Install,
  /// Serve one path through the cache policy, body to stdout
  Get { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Lock { action } => run_lock(&config, action),
    Command::Shell { action } => run_shell(&config, action).await,
    command => {
      ensure_unlocked(&config, args.pin.as_deref())?;
      let store = EntryStore::open_at(&config.ledger_db_path()?)?;
      run_ledger(&store, command)
    }
  }
}

fn ensure_unlocked(config: &Config, pin: Option<&str>) -> Result<()> {
  let lock = PinLock::at(config.lock_state_path()?);
  if !lock.is_enabled()? {
    return Ok(());
  }

  match pin {
    Some(pin) if lock.verify(pin)? => Ok(()),
    Some(_) => Err(eyre!("Wrong PIN")),
    None => Err(eyre!("The ledger is locked. Pass --pin to unlock.")),
  }
}

fn run_ledger(store: &EntryStore, command: Command) -> Result<()> {
  match command {
    Command::Add {
      date,
      investment,
      payout,
      memo,
    } => {
      let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
      let entry = LedgerEntry::new(date, investment, payout, memo);
      store.upsert(&entry)?;
      println!(
        "Recorded {}: {} ({})",
        entry.date,
        format_yen(entry.profit()),
        entry.id
      );
    }

    Command::List { year, month } => {
      let filter = PeriodFilter { year, month };
      let entries = filter.apply(store.list_all()?);
      if entries.is_empty() {
        println!("No sessions.");
        return Ok(());
      }
      for e in &entries {
        println!(
          "{}  {:>10}  in {:>8} / out {:>8}  {}  {}",
          e.date,
          format_yen(e.profit()),
          e.investment,
          e.payout,
          e.id,
          e.memo
        );
      }
    }

    Command::Delete { id } => {
      store.delete(&id)?;
      println!("Deleted {} (no-op if absent).", id);
    }

    Command::Wipe { yes } => {
      if !yes {
        return Err(eyre!("Refusing to wipe without --yes"));
      }
      store.clear_all()?;
      println!("All sessions deleted.");
    }

    Command::Summary { yearly } => {
      let entries = store.list_all()?;
      let totals = Totals::compute(&entries);
      println!("Total profit : {}", format_yen(totals.profit));
      println!(
        "Win rate     : {:.1}% ({}/{})",
        totals.win_rate(),
        totals.wins,
        totals.sessions
      );
      println!("Avg invest   : {}", format_yen(totals.avg_investment() as i64));
      println!("Avg payout   : {}", format_yen(totals.avg_payout() as i64));

      if yearly {
        println!("\nBy year:");
        for (year, profit) in yearly_profit(&entries) {
          println!("  {}  {:>10}", year, format_yen(profit));
        }
      } else {
        println!("\nBy month:");
        for (month, t) in monthly_rollup(&entries) {
          println!(
            "  {}  {:>10}  ({} sessions, {:.1}% wins)",
            month,
            format_yen(t.profit),
            t.count,
            t.win_rate()
          );
        }
      }
    }

    Command::ExportCsv { output } => {
      let csv = export_csv(&store.list_all()?);
      write_output(output, csv.as_bytes())?;
    }

    Command::Backup { output } => {
      let json = export_json(&store.list_all()?)?;
      write_output(output, json.as_bytes())?;
    }

    Command::Restore { input } => {
      let text = std::fs::read_to_string(&input)
        .map_err(|e| eyre!("Failed to read {}: {}", input.display(), e))?;
      let report = import_json(store, &text)?;
      println!(
        "Restored {} entries, skipped {}.",
        report.imported, report.skipped
      );
    }

    Command::Lock { .. } | Command::Shell { .. } => unreachable!("handled in main"),
  }

  Ok(())
}

fn run_lock(config: &Config, action: LockAction) -> Result<()> {
  let lock = PinLock::at(config.lock_state_path()?);

  match action {
    LockAction::SetPin { pin } => {
      lock.set_pin(&pin)?;
      println!("PIN set. The ledger is now locked.");
    }
    LockAction::ClearPin => {
      lock.clear_pin()?;
      println!("PIN cleared. The ledger is now unlocked.");
    }
    LockAction::Status => {
      if lock.is_enabled()? {
        println!("Lock: enabled");
      } else {
        println!("Lock: disabled");
      }
    }
  }

  Ok(())
}

async fn run_shell(config: &Config, action: ShellAction) -> Result<()> {
  let shell = config
    .shell
    .as_ref()
    .ok_or_else(|| eyre!("No `shell` section in the config file"))?;

  let storage = SqliteAssetStorage::open_at(&config.shell_db_path()?)?;
  let fetcher = HttpFetcher::new(Duration::from_secs(shell.network_timeout_secs))
    .map_err(|e| eyre!(e))?;
  let mut cache = ShellCache::new(
    storage,
    fetcher,
    shell.base_url()?,
    shell.generation.clone(),
    shell.manifest.clone(),
  )?;

  match action {
    ShellAction::Install => {
      cache.install().await?;
      println!(
        "Shell generation {} installed and active ({} assets).",
        cache.active_generation().unwrap_or("?"),
        shell.manifest.len()
      );
    }
    ShellAction::Get { path } => {
      let url = shell
        .base_url()?
        .join(&path)
        .map_err(|e| eyre!("Bad path {}: {}", path, e))?;
      let served = cache.handle(&url).await?;
      tracing::info!(source = ?served.source, bytes = served.body.len(), "serving {}", path);
      std::io::stdout().write_all(&served.body)?;
    }
  }

  Ok(())
}

fn write_output(output: Option<PathBuf>, bytes: &[u8]) -> Result<()> {
  match output {
    Some(path) => {
      std::fs::write(&path, bytes)
        .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
      println!("Wrote {}.", path.display());
    }
    None => std::io::stdout().write_all(bytes)?,
  }
  Ok(())
}

fn format_yen(n: i64) -> String {
  format!("{}円", n)
}

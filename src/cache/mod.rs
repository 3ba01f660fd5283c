//! Versioned offline cache for the application shell.
//!
//! Mirrors a fixed manifest of static assets locally so the application
//! keeps working without a network:
//! - exactly one cache generation is alive at a time; activation sweeps
//!   the rest
//! - document/stylesheet/script requests are network-first with cache
//!   fallback
//! - every other same-origin request is cache-first
//! - cross-origin requests pass through untouched

mod controller;
mod fetcher;
mod storage;

pub use controller::ShellCache;
pub use fetcher::HttpFetcher;
pub use storage::SqliteAssetStorage;

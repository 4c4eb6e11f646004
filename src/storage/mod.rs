//! Storage module: the dedup and persistence gate
//!
//! This module ensures product notifications go out at most once per
//! (site, url) pair, across process restarts. It owns the SQLite database
//! holding seen-item records and the cached exchange-rate snapshots.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::product::Product;
use crate::DramError;
use std::collections::HashSet;
use std::path::Path;

/// Floor on the seen-URL lookup window
pub const MIN_SEEN_LOOKBACK: usize = 200;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, DramError> {
    SqliteStorage::new(path)
}

/// Derives the seen-URL lookup bound for a site
///
/// Four times the per-crawl cap, floored at [`MIN_SEEN_LOOKBACK`]: a site
/// may briefly return more than `limit` new items across restarts, so the
/// lookup window keeps a safety margin over the cap. The bound only keeps
/// the in-memory set small for long site histories; it is not a
/// correctness requirement.
pub fn seen_lookback(site_limit: usize) -> usize {
    (site_limit * 4).max(MIN_SEEN_LOOKBACK)
}

/// Filters products down to those not yet seen, preserving order
///
/// Pure: no side effects, so running it twice over the same inputs yields
/// the same result.
pub fn filter_new(products: Vec<Product>, seen: &HashSet<String>) -> Vec<Product> {
    products
        .into_iter()
        .filter(|product| !seen.contains(&product.url))
        .collect()
}

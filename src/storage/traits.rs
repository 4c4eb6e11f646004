//! Storage trait and error types

use crate::product::Product;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The pipeline only needs a handful of operations: a bounded seen-URL read
/// per site, an idempotent seen-record write, and the exchange-rate snapshot
/// cache. Implementations must make `record_seen` a silent no-op on
/// duplicate (site, url) pairs — a crash between "sent to publisher" and
/// "recorded" must be safely retriable.
pub trait Storage: Send {
    /// Returns up to `limit` most recently recorded URLs for a site
    fn seen_urls(&self, site: &str, limit: usize) -> StorageResult<HashSet<String>>;

    /// Durably records (site, url) pairs; conflicting inserts are ignored
    fn record_seen(&mut self, products: &[Product]) -> StorageResult<()>;

    /// Per-site counts of recorded items, for operator statistics
    fn seen_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Looks up a cached rate snapshot for the given expiry boundary
    fn cached_rates(&self, expires: i64) -> StorageResult<Option<String>>;

    /// Caches a rate snapshot; a snapshot for the same expiry is kept as-is
    fn cache_rates(&mut self, expires: i64, data: &str) -> StorageResult<()>;
}

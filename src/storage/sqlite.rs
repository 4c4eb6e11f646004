//! SQLite storage implementation

use crate::product::Product;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::DramError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(DramError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, DramError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, DramError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    fn seen_urls(&self, site: &str, limit: usize) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM products WHERE site = ?1 ORDER BY id DESC LIMIT ?2",
        )?;

        let urls = stmt
            .query_map(params![site, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(urls)
    }

    fn record_seen(&mut self, products: &[Product]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            // ON CONFLICT DO NOTHING keeps retried inserts silent
            let mut stmt = tx.prepare(
                "INSERT INTO products (site, url, first_seen) VALUES (?1, ?2, ?3)
                 ON CONFLICT(site, url) DO NOTHING",
            )?;
            for product in products {
                stmt.execute(params![product.site, product.url, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn seen_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT site, COUNT(*) FROM products GROUP BY site ORDER BY site",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn cached_rates(&self, expires: i64) -> StorageResult<Option<String>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM rates WHERE expires = ?1",
                params![expires],
                |row| row.get(0),
            )
            .optional()?;

        Ok(data)
    }

    fn cache_rates(&mut self, expires: i64, data: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO rates (expires, data, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(expires) DO NOTHING",
            params![expires, data, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(site: &str, url: &str) -> Product {
        Product {
            site: site.to_string(),
            site_name: site.to_string(),
            currency: "EUR".to_string(),
            name: "Test".to_string(),
            price: Some(100.0),
            price_usd: None,
            abv: None,
            size: Some(700.0),
            url: url.to_string(),
            img: None,
        }
    }

    #[test]
    fn test_record_and_read_seen_urls() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .record_seen(&[
                product("a.example", "https://a.example/1"),
                product("a.example", "https://a.example/2"),
                product("b.example", "https://b.example/1"),
            ])
            .unwrap();

        let seen = storage.seen_urls("a.example", 100).unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("https://a.example/1"));
        assert!(!seen.contains("https://b.example/1"));
    }

    #[test]
    fn test_record_seen_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let items = [product("a.example", "https://a.example/1")];

        storage.record_seen(&items).unwrap();
        // A retried insert after a crash must not raise or duplicate
        storage.record_seen(&items).unwrap();

        let seen = storage.seen_urls("a.example", 100).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(storage.seen_counts().unwrap(), vec![("a.example".to_string(), 1)]);
    }

    #[test]
    fn test_seen_urls_respects_limit() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let items: Vec<Product> = (0..10)
            .map(|i| product("a.example", &format!("https://a.example/{i}")))
            .collect();
        storage.record_seen(&items).unwrap();

        let seen = storage.seen_urls("a.example", 3).unwrap();
        assert_eq!(seen.len(), 3);
        // Most recent rows win
        assert!(seen.contains("https://a.example/9"));
        assert!(!seen.contains("https://a.example/0"));
    }

    #[test]
    fn test_rates_cache_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.cached_rates(1234).unwrap().is_none());

        storage.cache_rates(1234, r#"{"EUR":1.1}"#).unwrap();
        assert_eq!(
            storage.cached_rates(1234).unwrap().as_deref(),
            Some(r#"{"EUR":1.1}"#)
        );
    }

    #[test]
    fn test_rates_cache_conflict_keeps_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.cache_rates(1234, "first").unwrap();
        storage.cache_rates(1234, "second").unwrap();
        assert_eq!(storage.cached_rates(1234).unwrap().as_deref(), Some("first"));
    }
}

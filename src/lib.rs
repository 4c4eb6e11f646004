//! Dramwatch: a scheduled product-drop crawler and notifier
//!
//! This crate implements a crawl-dedupe-notify pipeline: it periodically
//! drives a shared headless browser across a roster of retail product pages,
//! extracts listings via per-site rules, filters out previously seen items,
//! attaches a USD price estimate, persists the new items and hands them to a
//! publisher (Discord webhook or operator console).

pub mod browser;
pub mod config;
pub mod crawler;
pub mod currency;
pub mod product;
pub mod publish;
pub mod site;
pub mod storage;

use thiserror::Error;

/// Main error type for dramwatch operations
#[derive(Debug, Error)]
pub enum DramError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for dramwatch operations
pub type Result<T> = std::result::Result<T, DramError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use browser::CrawlFailure;
pub use config::Config;
pub use product::{Product, RawItem};
pub use site::SiteDefinition;

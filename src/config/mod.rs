//! Configuration module for dramwatch
//!
//! This module handles loading, parsing, and validating the TOML
//! configuration file, including the `[[sites]]` roster of crawl targets.
//!
//! # Example
//!
//! ```no_run
//! use dramwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawl interval: {}s", config.crawler.interval_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, DebugConfig, DiscordConfig, OutputConfig, RatesConfig,
};

// Re-export parser functions
pub use parser::load_config;

use crate::site::SiteDefinition;
use serde::Deserialize;
use std::time::Duration;

fn default_interval_secs() -> u64 {
    90
}

fn default_db_check() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_database_path() -> String {
    "./dramwatch.db".to_string()
}

/// Main configuration structure for dramwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub sites: Vec<SiteDefinition>,
}

/// Crawl pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Total budget for one pass over all sites, in seconds; the per-site
    /// unit delay is derived as interval / site count
    #[serde(rename = "interval-secs", default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Whether to dedup against the database before publishing
    #[serde(rename = "db-check", default = "default_db_check")]
    pub db_check: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            db_check: default_db_check(),
        }
    }
}

impl CrawlerConfig {
    /// Derives the minimum spacing between consecutive job starts
    ///
    /// Adding sites shortens per-site pacing rather than lengthening the
    /// aggregate cycle.
    pub fn unit_delay(&self, site_count: usize) -> Duration {
        Duration::from_secs(self.interval_secs) / site_count.max(1) as u32
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Hard per-page timeout for navigation plus extraction, milliseconds
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Override path to the browser executable
    #[serde(rename = "executable-path", default)]
    pub executable_path: Option<String>,

    /// Relay in-page console output into the operator log
    #[serde(rename = "console-relay", default)]
    pub console_relay: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            executable_path: None,
            console_relay: false,
        }
    }
}

impl BrowserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Discord delivery configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    /// Webhook receiving new-product embeds
    #[serde(rename = "webhook-url", default)]
    pub webhook_url: Option<String>,

    /// Webhook receiving operator error reports; falls back to `webhook-url`
    #[serde(rename = "error-webhook-url", default)]
    pub error_webhook_url: Option<String>,

    /// Disable delivery entirely (products go to the console)
    #[serde(default)]
    pub disabled: bool,
}

impl DiscordConfig {
    /// Whether webhook delivery is effectively available
    pub fn enabled(&self) -> bool {
        !self.disabled && self.webhook_url.is_some()
    }
}

/// Exchange-rate service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatesConfig {
    /// Endpoint returning a currency -> rate JSON document
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub disabled: bool,
}

impl RatesConfig {
    pub fn enabled(&self) -> bool {
        !self.disabled && self.endpoint.is_some()
    }
}

/// Operator debugging flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugConfig {
    /// Crawl normally but simulate persistence and delivery on the console
    #[serde(rename = "dry-run", default)]
    pub dry_run: bool,

    /// Like dry-run, additionally skipping webhook and rate-service access
    #[serde(default)]
    pub demo: bool,
}

impl DebugConfig {
    /// Whether persistence writes are live
    pub fn persist_live(&self) -> bool {
        !self.dry_run && !self.demo
    }
}

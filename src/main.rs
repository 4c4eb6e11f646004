//! Dramwatch main entry point
//!
//! This is the command-line interface for the dramwatch product-drop
//! watcher.

use clap::Parser;
use dramwatch::config::load_config;
use dramwatch::crawler::run;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Dramwatch: a product-drop watcher for specialist online shops
///
/// Dramwatch cycles through configured shop pages in a headless browser,
/// extracts newly listed products with per-site rules, filters out
/// everything already seen, and publishes the genuinely new arrivals.
#[derive(Parser, Debug)]
#[command(name = "dramwatch")]
#[command(version = "1.0.0")]
#[command(about = "A product-drop watcher for specialist online shops", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl a single site once, print what it found, and exit
    #[arg(long, value_name = "SLUG", conflicts_with = "stats")]
    once: Option<String>,

    /// Run the full loop but print to the console instead of publishing
    /// or writing seen-records
    #[arg(long)]
    dry_run: bool,

    /// Show seen-record statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config(&cli.config) {
        Ok(cfg) => {
            tracing::info!("Configuration loaded: {} site(s)", cfg.sites.len());
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        config.debug.dry_run = true;
    }

    // Handle different modes
    if let Some(slug) = cli.once {
        handle_once(config, &slug).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_watch(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dramwatch=info,warn"),
            1 => EnvFilter::new("dramwatch=debug,info"),
            2 => EnvFilter::new("dramwatch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --once: one undisturbed crawl of one site, results to stdout
///
/// Nothing is deduplicated, persisted, or published; this is the tool for
/// developing a new site's extraction rule.
async fn handle_once(
    config: dramwatch::config::Config,
    slug: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use dramwatch::browser::BrowserHost;
    use dramwatch::crawler::execute;

    let site = config
        .sites
        .iter()
        .find(|s| s.slug == slug)
        .ok_or_else(|| format!("no site with slug '{slug}' in configuration"))?;

    println!("=== One-shot crawl: {} ===\n", site.display_name());

    let host = BrowserHost::launch(&config.browser).await?;
    let outcome = execute(&host, site, &config.browser).await;
    host.close().await;

    match outcome {
        Ok(products) => {
            println!("Extracted {} product(s):\n", products.len());
            for product in &products {
                println!("  {} ", product.name);
                println!("    url:   {}", product.url);
                println!(
                    "    price: {:?} {}  abv: {:?}  size: {:?}ml",
                    product.price, product.currency, product.abv, product.size
                );
            }
            Ok(())
        }
        Err(e) => Err(format!("crawl failed: {e}").into()),
    }
}

/// Handles --stats: per-site seen-record counts from the database
fn handle_stats(config: &dramwatch::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    use dramwatch::storage::{open_storage, Storage};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(std::path::Path::new(&config.output.database_path))?;
    let counts = storage.seen_counts()?;

    if counts.is_empty() {
        println!("No seen-records yet");
        return Ok(());
    }

    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    println!("{:<40} {:>8}", "site", "seen");
    for (site, count) in &counts {
        println!("{site:<40} {count:>8}");
    }
    println!("{:<40} {total:>8}", "total");

    Ok(())
}

/// Handles the main watch loop
async fn handle_watch(
    config: dramwatch::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.debug.dry_run {
        tracing::info!("Dry run: printing to console, no seen-records will be written");
    }
    if config.debug.demo {
        tracing::info!("Demo mode: publishing and conversion disabled");
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Watch loop stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Watch loop failed: {}", e);
            Err(e.into())
        }
    }
}

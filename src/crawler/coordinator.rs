//! Crawl coordination
//!
//! Wires the queue, pacing, browser, storage, rates, and publisher into
//! the perpetual crawl loop. Each site contributes one repeating job;
//! every run of that job is one pacing turn, which may or may not become
//! an actual crawl.

use crate::browser::{BrowserHost, CrawlFailure};
use crate::config::{BrowserConfig, Config};
use crate::crawler::executor;
use crate::crawler::pacing::PacingTable;
use crate::crawler::queue::{Job, Queue};
use crate::currency::{attach_usd, HttpRateSource, NullRateSource, RateSource};
use crate::product::Product;
use crate::publish::{ConsolePublisher, DiscordWebhook, Publisher};
use crate::site::SiteDefinition;
use crate::storage::{self, Storage, StorageError};
use crate::{DramError, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Extra time a paced job may take beyond its pacing unit before the
/// scheduler moves on without it
const PACE_MARGIN: Duration = Duration::from_secs(3);

/// Shared pipeline dependencies, independent of the browser so the
/// post-crawl path can be exercised without one
pub struct PipelineCtx {
    pub storage: Arc<Mutex<dyn Storage>>,
    pub publisher: Arc<dyn Publisher>,
    pub rates: Arc<dyn RateSource>,
    pub pacing: Mutex<PacingTable>,
    /// Whether new products are filtered against previously seen URLs
    pub db_check: bool,
    /// Whether seen-records are written; dry runs and demos leave the
    /// database untouched
    pub persist: bool,
    /// Signalled on unrecoverable failures (browser disconnect)
    pub fatal: Arc<Notify>,
}

impl PipelineCtx {
    fn lock_storage(&self) -> std::result::Result<std::sync::MutexGuard<'_, dyn Storage + 'static>, StorageError> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
    }

    fn should_crawl(&self, site: &SiteDefinition) -> bool {
        match self.pacing.lock() {
            Ok(mut table) => table.state_mut(&site.slug).tick(site.delay),
            Err(_) => false,
        }
    }

    fn note_success(&self, site: &SiteDefinition) {
        if let Ok(mut table) = self.pacing.lock() {
            table.state_mut(&site.slug).on_success();
        }
    }

    fn note_timeout(&self, site: &SiteDefinition) -> bool {
        match self.pacing.lock() {
            Ok(mut table) => table.state_mut(&site.slug).on_timeout(site.delay),
            Err(_) => false,
        }
    }

    fn note_failure(&self, site: &SiteDefinition) {
        if let Ok(mut table) = self.pacing.lock() {
            table.state_mut(&site.slug).on_failure(site.delay);
        }
    }
}

/// Runs crawl results through dedup, conversion, persistence, and
/// publication
///
/// `products` arrive newest-first as crawled; they are flipped here so
/// downstream consumers see oldest-first. A dedup read failure aborts the
/// whole delivery (publishing without the seen-filter would spam), a
/// persistence failure aborts publication, and a publication failure only
/// gets reported.
///
/// # Returns
///
/// Number of genuinely new products delivered.
pub async fn deliver_new_products(
    ctx: &PipelineCtx,
    site: &SiteDefinition,
    mut products: Vec<Product>,
) -> Result<usize> {
    products.reverse();

    let mut fresh = if ctx.db_check {
        let seen = ctx
            .lock_storage()?
            .seen_urls(&site.slug, storage::seen_lookback(site.limit))?;
        storage::filter_new(products, &seen)
    } else {
        products
    };

    if fresh.is_empty() {
        tracing::debug!(site = %site.slug, "No new products this cycle");
        return Ok(0);
    }

    if let Some(rates) = ctx.rates.rates().await {
        attach_usd(&mut fresh, &rates);
    }

    if ctx.persist {
        ctx.lock_storage()?.record_seen(&fresh)?;
    }

    if let Err(e) = ctx.publisher.publish(&fresh).await {
        tracing::error!(site = %site.slug, "Publication failed: {e}");
        ctx.publisher
            .report_error(&site.slug, &format!("publication failed: {e}"))
            .await;
    }

    Ok(fresh.len())
}

/// One pacing turn for one site
pub async fn run_cycle(
    ctx: Arc<PipelineCtx>,
    host: Arc<BrowserHost>,
    settings: BrowserConfig,
    site: Arc<SiteDefinition>,
) {
    if !ctx.should_crawl(&site) {
        tracing::trace!(site = %site.slug, "Pacing skip");
        return;
    }

    match executor::execute(&host, &site, &settings).await {
        Ok(products) => {
            ctx.note_success(&site);
            tracing::debug!(site = %site.slug, count = products.len(), "Crawl completed");
            if products.is_empty() {
                return;
            }
            match deliver_new_products(&ctx, &site, products).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(site = %site.slug, count, "Published new products");
                }
                Err(e) => {
                    tracing::error!(site = %site.slug, "Delivery halted: {e}");
                    ctx.publisher
                        .report_error(&site.slug, &format!("delivery halted: {e}"))
                        .await;
                }
            }
        }
        Err(CrawlFailure::Timeout) => {
            tracing::warn!(site = %site.slug, "Crawl timed out");
            if ctx.note_timeout(&site) {
                ctx.publisher
                    .report_error(&site.slug, "4 consecutive crawl timeouts")
                    .await;
            }
        }
        Err(CrawlFailure::Disconnected) => {
            tracing::error!(site = %site.slug, "Browser disconnected; shutting down");
            ctx.publisher
                .report_error("browser", "automation browser disconnected")
                .await;
            ctx.fatal.notify_one();
        }
        Err(CrawlFailure::Other(msg)) => {
            tracing::error!(site = %site.slug, "Crawl failed: {msg}");
            ctx.note_failure(&site);
            ctx.publisher.report_error(&site.slug, &msg).await;
        }
    }
}

/// Runs a job under the pacing combinator
///
/// Completion takes at least `unit` (fast jobs wait out the remainder)
/// and at most `unit + PACE_MARGIN` (slow jobs keep running detached
/// while the scheduler moves on).
pub async fn pace<F>(job: F, unit: Duration)
where
    F: Future<Output = ()> + Send + 'static,
{
    let work = tokio::spawn(job);
    tokio::select! {
        _ = async {
            let (result, _) = tokio::join!(work, tokio::time::sleep(unit));
            if let Err(e) = result {
                tracing::error!("Paced job panicked: {e}");
            }
        } => {}
        _ = tokio::time::sleep(unit + PACE_MARGIN) => {
            tracing::warn!("Paced job exceeded its slot; continuing without it");
        }
    }
}

/// Owns the crawl loop for one configured run
pub struct Coordinator {
    ctx: Arc<PipelineCtx>,
    host: Arc<BrowserHost>,
    queue: Arc<Queue>,
    sites: Vec<Arc<SiteDefinition>>,
    browser_settings: BrowserConfig,
    unit_delay: Duration,
}

impl Coordinator {
    /// Builds the full pipeline from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let storage: Arc<Mutex<dyn Storage>> = Arc::new(Mutex::new(storage::open_storage(
            std::path::Path::new(&config.output.database_path),
        )?));

        let publisher: Arc<dyn Publisher> = if config.debug.persist_live()
            && config.discord.enabled()
        {
            match &config.discord.webhook_url {
                Some(url) => Arc::new(DiscordWebhook::new(
                    url.clone(),
                    config.discord.error_webhook_url.clone(),
                )?),
                None => Arc::new(ConsolePublisher),
            }
        } else {
            Arc::new(ConsolePublisher)
        };

        let rates: Arc<dyn RateSource> = match (&config.rates.endpoint, config.rates.enabled()) {
            (Some(endpoint), true) if !config.debug.demo => {
                Arc::new(HttpRateSource::new(endpoint.clone(), storage.clone())?)
            }
            _ => Arc::new(NullRateSource),
        };

        let host = Arc::new(BrowserHost::launch(&config.browser).await?);

        let sites: Vec<Arc<SiteDefinition>> =
            config.sites.into_iter().map(Arc::new).collect();
        let unit_delay = config.crawler.unit_delay(sites.len());

        let ctx = Arc::new(PipelineCtx {
            storage,
            publisher,
            rates,
            pacing: Mutex::new(PacingTable::new()),
            db_check: config.crawler.db_check,
            persist: config.debug.persist_live(),
            fatal: Arc::new(Notify::new()),
        });

        Ok(Self {
            ctx,
            host,
            queue: Queue::new(true),
            sites,
            browser_settings: config.browser,
            unit_delay,
        })
    }

    /// Enqueues every site and runs until a shutdown signal or a fatal
    /// pipeline failure
    pub async fn run(self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(DramError::Config(crate::ConfigError::Validation(
                "no sites configured".to_string(),
            )));
        }

        tracing::info!(
            sites = self.sites.len(),
            unit_delay_secs = self.unit_delay.as_secs(),
            "Starting crawl loop"
        );

        for site in &self.sites {
            tracing::debug!(
                site = %site.slug,
                delay = site.delay,
                hidden = site.hidden,
                "Site enqueued"
            );
            self.queue.add(self.site_job(site.clone()));
        }

        let shutdown = self.ctx.fatal.clone();
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let shutdown = shutdown.clone();
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::spawn(async move {
                        term.recv().await;
                        shutdown.notify_one();
                    });
                }
                Err(e) => tracing::warn!("SIGTERM handler unavailable: {e}"),
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received; shutting down");
            }
            _ = shutdown.notified() => {
                tracing::info!("Shutdown requested; stopping crawl loop");
            }
        }

        self.queue.stop();
        self.host.close().await;
        Ok(())
    }

    /// Wraps one site's cycle in the pacing combinator as a queue job
    fn site_job(&self, site: Arc<SiteDefinition>) -> Job {
        let ctx = self.ctx.clone();
        let host = self.host.clone();
        let settings = self.browser_settings.clone();
        let unit = self.unit_delay;
        Arc::new(move || {
            let cycle = run_cycle(ctx.clone(), host.clone(), settings.clone(), site.clone());
            Box::pin(pace(cycle, unit))
        })
    }
}

//! Browser automation adapter
//!
//! This module owns the shared headless-browser resource (one Chromium
//! instance driven over CDP) and is the only place that looks at
//! driver-level errors. Everything downstream sees the [`CrawlFailure`]
//! taxonomy: transient timeouts, a fatal disconnect of the browser itself,
//! or an uncategorized per-site failure.

mod intercept;

pub use intercept::{install_interception, PLACEHOLDER_GIF};

use crate::config::BrowserConfig;
use crate::DramError;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::fmt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Classified crawl failure, produced once at this adapter boundary
///
/// The pipeline matches on these tags and never on driver error shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlFailure {
    /// Navigation or extraction exceeded the configured timeout
    Timeout,

    /// The shared browser died or the CDP connection was severed; fatal at
    /// the process level, not per-site
    Disconnected,

    /// Anything else; contained to the failing site's cycle
    Other(String),
}

impl fmt::Display for CrawlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "crawl timed out"),
            Self::Disconnected => write!(f, "browser disconnected"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Plausible desktop client identities, one picked at random per crawl to
/// reduce fingerprinting-based blocking
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Picks a randomized but plausible user-agent string
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// The shared browser instance plus its CDP event loop
///
/// Exactly one of these exists per process. Page acquisition is cheap; the
/// scheduler ensures only one crawl drives the browser at a time.
pub struct BrowserHost {
    browser: Mutex<Browser>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    disconnected: watch::Receiver<bool>,
}

impl BrowserHost {
    /// Launches the browser and starts its event loop
    ///
    /// # Arguments
    ///
    /// * `settings` - Browser configuration (timeout, executable override)
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserHost)` - Browser is up and the CDP handler is running
    /// * `Err(DramError)` - Launch failed
    pub async fn launch(settings: &BrowserConfig) -> Result<Self, DramError> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox");

        if let Some(path) = &settings.executable_path {
            builder = builder.chrome_executable(path);
        }

        let chrome_config = builder.build().map_err(DramError::Browser)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| DramError::Browser(e.to_string()))?;

        // The handler stream ends when the browser process dies or the CDP
        // websocket drops; that is our disconnect signal.
        let (tx, rx) = watch::channel(false);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            let _ = tx.send(true);
        });

        tracing::info!("Browser instance launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task: Mutex::new(Some(handler_task)),
            disconnected: rx,
        })
    }

    /// Whether the browser connection has been severed
    pub fn is_disconnected(&self) -> bool {
        *self.disconnected.borrow()
    }

    /// Acquires a fresh page, the unit of isolation per crawl
    pub async fn new_page(&self) -> Result<Page, CrawlFailure> {
        let browser = self.browser.lock().await;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| self.classify(e))
    }

    /// Classifies a driver error into the crawl-failure taxonomy
    ///
    /// Classification is by adapter state, not error-string sniffing: any
    /// error raised after the handler stream ended means the browser itself
    /// is gone.
    pub fn classify(&self, err: CdpError) -> CrawlFailure {
        if self.is_disconnected() {
            CrawlFailure::Disconnected
        } else {
            CrawlFailure::Other(err.to_string())
        }
    }

    /// Closes the browser and waits for the event loop to drain
    pub async fn close(&self) {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser cleanly: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Browser process wait failed: {e}");
            }
        }

        if let Some(task) = self.handler_task.lock().await.take() {
            let _ = task.await;
        }
    }
}

/// Prepares a freshly acquired page for one crawl
///
/// Sets the randomized client identity, installs request interception, and
/// optionally attaches the per-site cookie header and the in-page console
/// relay.
pub async fn prepare_page(
    page: &Page,
    cookie: Option<&str>,
    console_relay: bool,
) -> Result<(), CdpError> {
    page.set_user_agent(random_user_agent()).await?;

    install_interception(page).await?;

    if let Some(cookie) = cookie {
        let headers = Headers::new(serde_json::json!({ "cookie": cookie }));
        page.execute(SetExtraHttpHeadersParams::new(headers)).await?;
    }

    if console_relay {
        relay_console(page).await?;
    }

    Ok(())
}

/// Relays the page's own console output into the operator log
async fn relay_console(page: &Page) -> Result<(), CdpError> {
    let mut events = page.event_listener::<EventConsoleApiCalled>().await?;
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            for arg in &event.args {
                if let Some(value) = &arg.value {
                    tracing::debug!(target: "dramwatch::page_console", "{value}");
                }
            }
        }
    });
    Ok(())
}

/// Waits until the selector matches at least one node
///
/// Polls inside the page; the caller's overall crawl timeout bounds the
/// wait, so a selector that never appears surfaces as a timeout.
pub async fn wait_for_selector(page: &Page, selector: &str) -> Result<(), CdpError> {
    let probe = format!(
        "document.querySelectorAll({}).length > 0",
        serde_json::Value::String(selector.to_string())
    );

    loop {
        let present: bool = page.evaluate(probe.clone()).await?.into_value()?;
        if present {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_is_plausible() {
        for _ in 0..20 {
            let ua = random_user_agent();
            assert!(ua.starts_with("Mozilla/5.0"));
        }
    }

    #[test]
    fn test_crawl_failure_display() {
        assert_eq!(CrawlFailure::Timeout.to_string(), "crawl timed out");
        assert_eq!(
            CrawlFailure::Disconnected.to_string(),
            "browser disconnected"
        );
        assert_eq!(
            CrawlFailure::Other("boom".to_string()).to_string(),
            "boom"
        );
    }
}

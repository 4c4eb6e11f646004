//! Single-site crawl execution
//!
//! One crawl is: fresh page, navigate, wait for the product selector, run
//! the site's extraction rule in-page, normalize whatever comes back. The
//! whole sequence runs under one timeout and the page is closed no matter
//! how it went.

use crate::browser::{self, BrowserHost, CrawlFailure};
use crate::config::BrowserConfig;
use crate::product::{Product, RawItem};
use crate::site::SiteDefinition;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;

/// Crawls one site once
///
/// # Arguments
///
/// * `host` - The shared browser
/// * `site` - Site to crawl
/// * `settings` - Browser settings (timeout, console relay)
///
/// # Returns
///
/// * `Ok(products)` - Normalized products in page order, newest first,
///   capped at the site's limit
/// * `Err(CrawlFailure)` - Classified failure
pub async fn execute(
    host: &BrowserHost,
    site: &SiteDefinition,
    settings: &BrowserConfig,
) -> Result<Vec<Product>, CrawlFailure> {
    let page = host.new_page().await?;

    let outcome = tokio::time::timeout(settings.timeout(), drive(&page, site, settings)).await;

    if let Err(e) = page.close().await {
        tracing::trace!(site = %site.slug, "Page close failed: {e}");
    }

    match outcome {
        Err(_elapsed) => Err(CrawlFailure::Timeout),
        Ok(Err(cdp_err)) => Err(host.classify(cdp_err)),
        Ok(Ok(products)) => Ok(products),
    }
}

async fn drive(
    page: &Page,
    site: &SiteDefinition,
    settings: &BrowserConfig,
) -> Result<Vec<Product>, CdpError> {
    browser::prepare_page(page, site.cookies.as_deref(), settings.console_relay).await?;

    page.goto(&site.url).await?;
    page.wait_for_navigation().await?;
    browser::wait_for_selector(page, &site.selector).await?;

    let raw: Vec<serde_json::Value> = page
        .evaluate(site.extraction_script())
        .await?
        .into_value()?;

    Ok(normalize_batch(site, raw))
}

/// Converts the extraction rule's output array into products
///
/// Entries the rule declined (`false`, `null`) or that fail the product
/// gate (no resolvable URL, suspiciously small size) are dropped without
/// failing the crawl.
pub fn normalize_batch(site: &SiteDefinition, raw: Vec<serde_json::Value>) -> Vec<Product> {
    let mut products: Vec<Product> = raw
        .into_iter()
        .filter(|value| value.is_object())
        .filter_map(|value| match serde_json::from_value::<RawItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(site = %site.slug, "Skipping malformed item: {e}");
                None
            }
        })
        .filter_map(|item| Product::from_raw(site, item))
        .collect();

    // limit = 0 means uncapped
    if site.limit > 0 && products.len() > site.limit {
        products.truncate(site.limit);
    }
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site() -> SiteDefinition {
        toml::from_str(
            r#"
            slug = "shop.example.com"
            currency = "EUR"
            url = "https://shop.example.com/new"
            selector = ".product"
            rule = { body = "return {};" }
            limit = 2
            "#,
        )
        .expect("valid site definition")
    }

    #[test]
    fn test_normalize_batch_drops_declined_and_malformed_entries() {
        let raw = vec![
            json!(false),
            json!(null),
            json!({ "name": "A", "price": "10", "url": "/a" }),
            json!("not an object"),
        ];
        let products = normalize_batch(&site(), raw);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "A");
        assert_eq!(products[0].url, "https://www.shop.example.com/a");
    }

    #[test]
    fn test_normalize_batch_caps_at_site_limit_in_page_order() {
        let raw = (0..5)
            .map(|i| json!({ "name": format!("p{i}"), "price": "10", "url": format!("/p{i}") }))
            .collect();
        let products = normalize_batch(&site(), raw);
        assert_eq!(products.len(), 2);
        // Page order is newest-first; the cap keeps the newest entries.
        assert_eq!(products[0].name, "p0");
        assert_eq!(products[1].name, "p1");
    }

    #[test]
    fn test_zero_limit_means_uncapped() {
        let mut site = site();
        site.limit = 0;
        let raw = (0..5)
            .map(|i| json!({ "name": format!("p{i}"), "price": "10", "url": format!("/p{i}") }))
            .collect();
        assert_eq!(normalize_batch(&site, raw).len(), 5);
    }
}

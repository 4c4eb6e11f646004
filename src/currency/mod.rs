//! Currency conversion
//!
//! Attaches an approximate USD price to products quoted in other
//! currencies. Rate snapshots are fetched from a configurable endpoint at
//! most once per calendar week (they roll over at the next Sunday, UTC)
//! and cached in the database. Conversion is strictly best-effort: any
//! failure here degrades to products without a USD figure, never to a
//! failed cycle.

use crate::product::Product;
use crate::storage::{Storage, StorageError};
use crate::DramError;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Source of currency rates, injected into the pipeline
///
/// Returning `None` means "no conversion this cycle" and is a normal
/// outcome, not an error.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Current rate table keyed by ISO 4217 code, all relative to one
    /// common base currency
    async fn rates(&self) -> Option<HashMap<String, f64>>;
}

/// Rate source for configurations with conversion disabled
pub struct NullRateSource;

#[async_trait]
impl RateSource for NullRateSource {
    async fn rates(&self) -> Option<HashMap<String, f64>> {
        None
    }
}

/// Fetches rate snapshots over HTTP with weekly database caching
pub struct HttpRateSource {
    client: reqwest::Client,
    endpoint: String,
    storage: Arc<Mutex<dyn Storage>>,
}

impl HttpRateSource {
    /// Creates a rate source backed by the given endpoint and cache store
    ///
    /// # Arguments
    ///
    /// * `endpoint` - URL returning a JSON rate table
    /// * `storage` - Store holding the weekly snapshot cache
    pub fn new(endpoint: String, storage: Arc<Mutex<dyn Storage>>) -> Result<Self, DramError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            storage,
        })
    }

    fn lock_storage(&self) -> Result<std::sync::MutexGuard<'_, dyn Storage + 'static>, DramError> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()).into())
    }

    async fn fetch_or_cached(&self) -> Result<HashMap<String, f64>, DramError> {
        let expires = next_sunday_expiry(Utc::now());

        let cached = self.lock_storage()?.cached_rates(expires)?;
        if let Some(snapshot) = cached {
            match parse_rates(&snapshot) {
                Ok(rates) => return Ok(rates),
                Err(e) => tracing::warn!("Discarding unreadable cached rate snapshot: {e}"),
            }
        }

        let body = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let rates = parse_rates(&body)
            .map_err(|e| StorageError::Database(format!("unusable rate response: {e}")))?;

        self.lock_storage()?.cache_rates(expires, &body)?;
        tracing::info!(count = rates.len(), "Fetched fresh currency rates");

        Ok(rates)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn rates(&self) -> Option<HashMap<String, f64>> {
        match self.fetch_or_cached().await {
            Ok(rates) => Some(rates),
            Err(e) => {
                tracing::warn!("Currency rates unavailable this cycle: {e}");
                None
            }
        }
    }
}

/// Millisecond timestamp of the upcoming Sunday at 00:00:00 UTC
///
/// A snapshot taken any time during a week shares this boundary, which is
/// what makes it the cache key.
pub fn next_sunday_expiry(now: DateTime<Utc>) -> i64 {
    let days_until = 7 - i64::from(now.weekday().num_days_from_sunday());
    let sunday = now.date_naive() + Duration::days(days_until);
    sunday
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Parses a rate table out of an endpoint or cached response body
///
/// Accepts either a flat `{"EUR": 1.1, ...}` object or the common wrapped
/// form `{"rates": {...}, ...}`.
pub fn parse_rates(body: &str) -> Result<HashMap<String, f64>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let table = value.get("rates").unwrap_or(&value);

    let mut rates = HashMap::new();
    if let Some(map) = table.as_object() {
        for (code, rate) in map {
            if let Some(rate) = rate.as_f64() {
                rates.insert(code.clone(), rate);
            }
        }
    }
    Ok(rates)
}

/// Attaches rounded USD prices to products quoted in other currencies
///
/// Products already in USD, products without a parsed price, and
/// currencies missing from the table are all left untouched.
pub fn attach_usd(products: &mut [Product], rates: &HashMap<String, f64>) {
    let Some(usd) = rates.get("USD") else {
        return;
    };

    for product in products.iter_mut() {
        if product.currency == "USD" {
            continue;
        }
        if let (Some(price), Some(rate)) = (product.price, rates.get(&product.currency)) {
            let converted = price * rate / usd;
            product.price_usd = Some((converted * 100.0).round() / 100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn shared_memory_storage() -> Arc<Mutex<dyn Storage>> {
        Arc::new(Mutex::new(
            SqliteStorage::new_in_memory().expect("in-memory storage"),
        ))
    }

    fn product(currency: &str, price: Option<f64>) -> Product {
        Product {
            site: "shop".to_string(),
            site_name: "Shop".to_string(),
            currency: currency.to_string(),
            name: "Dram".to_string(),
            price,
            price_usd: None,
            abv: None,
            size: None,
            url: "https://shop.example.com/p/1".to_string(),
            img: None,
        }
    }

    #[test]
    fn test_next_sunday_expiry_mid_week() {
        // Wednesday 2026-01-07 -> Sunday 2026-01-11 00:00:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 15, 30, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 11, 0, 0, 0).unwrap();
        assert_eq!(next_sunday_expiry(now), expected.timestamp_millis());
    }

    #[test]
    fn test_next_sunday_expiry_on_sunday_rolls_a_full_week() {
        let now = Utc.with_ymd_and_hms(2026, 1, 4, 0, 0, 1).unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 11, 0, 0, 0).unwrap();
        assert_eq!(next_sunday_expiry(now), expected.timestamp_millis());
    }

    #[test]
    fn test_parse_rates_flat_and_wrapped() {
        let flat = r#"{"USD": 1200.0, "EUR": 1300.5}"#;
        let wrapped = r#"{"base": "KRW", "rates": {"USD": 1200.0, "EUR": 1300.5}}"#;

        for body in [flat, wrapped] {
            let rates = parse_rates(body).unwrap();
            assert_eq!(rates.get("USD"), Some(&1200.0));
            assert_eq!(rates.get("EUR"), Some(&1300.5));
        }
    }

    #[test]
    fn test_parse_rates_skips_non_numeric_entries() {
        let rates = parse_rates(r#"{"USD": 1200.0, "note": "weekly"}"#).unwrap();
        assert_eq!(rates.len(), 1);
    }

    #[test]
    fn test_attach_usd_converts_and_rounds() {
        let rates =
            HashMap::from([("USD".to_string(), 1200.0), ("EUR".to_string(), 1300.0)]);
        let mut products = vec![product("EUR", Some(100.0))];
        attach_usd(&mut products, &rates);
        // 100 * 1300 / 1200 = 108.333.. -> 108.33
        assert_eq!(products[0].price_usd, Some(108.33));
    }

    #[test]
    fn test_attach_usd_leaves_usd_and_unknown_currencies_alone() {
        let rates = HashMap::from([("USD".to_string(), 1200.0)]);
        let mut products = vec![product("USD", Some(50.0)), product("GBP", Some(50.0))];
        attach_usd(&mut products, &rates);
        assert_eq!(products[0].price_usd, None);
        assert_eq!(products[1].price_usd, None);
    }

    #[test]
    fn test_attach_usd_without_usd_rate_is_a_no_op() {
        let rates = HashMap::from([("EUR".to_string(), 1300.0)]);
        let mut products = vec![product("EUR", Some(100.0))];
        attach_usd(&mut products, &rates);
        assert_eq!(products[0].price_usd, None);
    }

    #[tokio::test]
    async fn test_http_rate_source_fetches_once_then_serves_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"USD": 1200.0, "EUR": 1300.0}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source =
            HttpRateSource::new(format!("{}/rates", server.uri()), shared_memory_storage())
                .unwrap();

        let first = source.rates().await.expect("first fetch succeeds");
        assert_eq!(first.get("EUR"), Some(&1300.0));

        // Second call within the same week must be served from the cache;
        // the mock's expect(1) verifies no second request went out.
        let second = source.rates().await.expect("cached fetch succeeds");
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_http_rate_source_degrades_to_none_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source =
            HttpRateSource::new(format!("{}/rates", server.uri()), shared_memory_storage())
                .unwrap();

        assert!(source.rates().await.is_none());
    }
}

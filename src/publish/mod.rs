//! Publication seam
//!
//! The pipeline hands finished products to a [`Publisher`] and neither
//! knows nor cares where they end up. The production implementation posts
//! Discord webhook embeds; dry runs and demos use the console publisher.

use crate::product::Product;
use crate::DramError;
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// Discord caps embeds per webhook message
const EMBEDS_PER_MESSAGE: usize = 10;

/// Errors surfaced by a publisher
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("webhook rejected the message with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Destination for newly discovered products
///
/// `report_error` is fire-and-forget by contract: implementations log
/// their own delivery problems rather than returning them, so error
/// reporting can never start an error loop.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a batch of new products, oldest first
    async fn publish(&self, products: &[Product]) -> Result<(), PublishError>;

    /// Reports an operational problem to the operator channel
    async fn report_error(&self, context: &str, detail: &str);
}

/// Writes products to stdout; used by dry runs, demos, and one-shot crawls
pub struct ConsolePublisher;

#[async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(&self, products: &[Product]) -> Result<(), PublishError> {
        for product in products {
            println!(
                "{} | {} | {} | {} | {} | {}",
                product.site_name,
                product.name,
                format_price(product),
                product
                    .abv
                    .map(|a| format!("{a}%"))
                    .unwrap_or_else(|| "-".to_string()),
                product
                    .size
                    .map(|s| format!("{s}ml"))
                    .unwrap_or_else(|| "-".to_string()),
                product.url,
            );
        }
        Ok(())
    }

    async fn report_error(&self, context: &str, detail: &str) {
        tracing::error!("[{context}] {detail}");
    }
}

/// Posts product embeds to a Discord webhook
pub struct DiscordWebhook {
    client: reqwest::Client,
    webhook_url: String,
    error_webhook_url: Option<String>,
}

impl DiscordWebhook {
    /// Creates a webhook publisher
    ///
    /// # Arguments
    ///
    /// * `webhook_url` - Destination for product embeds
    /// * `error_webhook_url` - Optional separate destination for error
    ///   reports; falls back to the product webhook when absent
    pub fn new(
        webhook_url: String,
        error_webhook_url: Option<String>,
    ) -> Result<Self, DramError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
            error_webhook_url,
        })
    }

    async fn post(&self, url: &str, payload: serde_json::Value) -> Result<(), PublishError> {
        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PublishError::Rejected(status))
        }
    }
}

#[async_trait]
impl Publisher for DiscordWebhook {
    async fn publish(&self, products: &[Product]) -> Result<(), PublishError> {
        for chunk in products.chunks(EMBEDS_PER_MESSAGE) {
            let embeds: Vec<_> = chunk.iter().map(product_embed).collect();
            self.post(&self.webhook_url, json!({ "embeds": embeds }))
                .await?;
        }
        Ok(())
    }

    async fn report_error(&self, context: &str, detail: &str) {
        let url = self
            .error_webhook_url
            .as_deref()
            .unwrap_or(&self.webhook_url);
        let payload = json!({ "content": format!("⚠ **{context}**: {detail}") });
        if let Err(e) = self.post(url, payload).await {
            tracing::error!("Failed to deliver error report for [{context}]: {e}");
        }
    }
}

/// Renders one product as a Discord embed object
fn product_embed(product: &Product) -> serde_json::Value {
    let mut fields = Vec::new();
    fields.push(json!({ "name": "Price", "value": format_price(product), "inline": true }));
    if let Some(abv) = product.abv {
        fields.push(json!({ "name": "ABV", "value": format!("{abv}%"), "inline": true }));
    }
    if let Some(size) = product.size {
        fields.push(json!({ "name": "Size", "value": format!("{size}ml"), "inline": true }));
    }

    let mut embed = json!({
        "title": product.name,
        "url": product.url,
        "footer": { "text": product.site_name },
        "fields": fields,
    });
    if let Some(img) = &product.img {
        embed["thumbnail"] = json!({ "url": img });
    }
    embed
}

/// Formats the quoted price with the approximate USD figure when known
fn format_price(product: &Product) -> String {
    match (product.price, product.price_usd) {
        (Some(price), Some(usd)) => {
            format!("{price:.2} {} (≈ {usd:.2} USD)", product.currency)
        }
        (Some(price), None) => format!("{price:.2} {}", product.currency),
        (None, _) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn product(name: &str) -> Product {
        Product {
            site: "shop".to_string(),
            site_name: "Shop Example".to_string(),
            currency: "EUR".to_string(),
            name: name.to_string(),
            price: Some(123.45),
            price_usd: Some(134.0),
            abv: Some(46.0),
            size: Some(700.0),
            url: format!("https://shop.example.com/p/{name}"),
            img: Some("https://shop.example.com/img/1.jpg".to_string()),
        }
    }

    #[test]
    fn test_product_embed_fields() {
        let embed = product_embed(&product("Dram 12"));
        assert_eq!(embed["title"], "Dram 12");
        assert_eq!(embed["footer"]["text"], "Shop Example");
        assert_eq!(embed["thumbnail"]["url"], "https://shop.example.com/img/1.jpg");
        assert_eq!(embed["fields"][0]["name"], "Price");
        assert_eq!(embed["fields"][0]["value"], "123.45 EUR (≈ 134.00 USD)");
        assert_eq!(embed["fields"][1]["value"], "46%");
        assert_eq!(embed["fields"][2]["value"], "700ml");
    }

    #[test]
    fn test_format_price_without_conversion() {
        let mut p = product("x");
        p.price_usd = None;
        assert_eq!(format_price(&p), "123.45 EUR");
        p.price = None;
        assert_eq!(format_price(&p), "unknown");
    }

    #[tokio::test]
    async fn test_webhook_chunks_large_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let publisher =
            DiscordWebhook::new(format!("{}/hook", server.uri()), None).unwrap();

        // 12 products -> one full message of 10 embeds plus one of 2
        let batch: Vec<_> = (0..12).map(|i| product(&format!("p{i}"))).collect();
        publisher.publish(&batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_surfaces_rejection_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let publisher =
            DiscordWebhook::new(format!("{}/hook", server.uri()), None).unwrap();

        let err = publisher.publish(&[product("x")]).await.unwrap_err();
        assert!(matches!(err, PublishError::Rejected(status) if status.as_u16() == 429));
    }

    #[tokio::test]
    async fn test_error_reports_prefer_the_error_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/errors"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = DiscordWebhook::new(
            format!("{}/hook", server.uri()),
            Some(format!("{}/errors", server.uri())),
        )
        .unwrap();

        publisher.report_error("shop", "4 consecutive crawl timeouts").await;
    }
}

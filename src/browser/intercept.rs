//! Request interception
//!
//! Product pages are crawled for their DOM, not their pixels. Every image
//! request is answered locally with a 1x1 transparent GIF, and other heavy
//! resource classes (media, stylesheets, fonts) get an empty 200, so the
//! page's scripts still see their requests "succeed" while nothing heavy
//! crosses the wire. Documents, scripts, and XHR pass through untouched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FulfillRequestParams, HeaderEntry,
    RequestId, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;

/// Smallest valid GIF: one transparent pixel, 43 bytes
pub const PLACEHOLDER_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, // 1x1
    0x80, 0x00, 0x00, // palette flags
    0x00, 0x00, 0x00, 0xff, 0xff, 0xff, // colors
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // graphic control
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // image data
    0x3b, // trailer
];

/// Enables fetch-stage interception on a page and spawns the responder
///
/// The responder task lives as long as the page's event stream does, so no
/// explicit teardown is needed when the page closes.
pub async fn install_interception(page: &Page) -> Result<(), CdpError> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;

    page.execute(
        EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .request_stage(RequestStage::Request)
                    .build(),
            )
            .build(),
    )
    .await?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let request_id = event.request_id.clone();
            let outcome = match event.resource_type {
                ResourceType::Image => fulfill_placeholder_gif(&page, request_id).await,
                ResourceType::Media
                | ResourceType::Stylesheet
                | ResourceType::Font
                | ResourceType::Other => fulfill_empty(&page, request_id).await,
                _ => page
                    .execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = outcome {
                // The page may already be gone by the time we answer.
                tracing::trace!("Interception reply failed: {e}");
            }
        }
    });

    Ok(())
}

async fn fulfill_placeholder_gif(page: &Page, request_id: RequestId) -> Result<(), CdpError> {
    let params = FulfillRequestParams::builder()
        .request_id(request_id)
        .response_code(200)
        .response_header(HeaderEntry {
            name: "Content-Type".to_string(),
            value: "image/gif".to_string(),
        })
        .response_header(HeaderEntry {
            name: "Content-Length".to_string(),
            value: PLACEHOLDER_GIF.len().to_string(),
        })
        .body(BASE64.encode(PLACEHOLDER_GIF))
        .build();

    match params {
        Ok(params) => page.execute(params).await.map(|_| ()),
        Err(e) => {
            tracing::warn!("Malformed fulfill params: {e}");
            Ok(())
        }
    }
}

async fn fulfill_empty(page: &Page, request_id: RequestId) -> Result<(), CdpError> {
    let params = FulfillRequestParams::builder()
        .request_id(request_id)
        .response_code(200)
        .build();

    match params {
        Ok(params) => page.execute(params).await.map(|_| ()),
        Err(e) => {
            tracing::warn!("Malformed fulfill params: {e}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_gif_shape() {
        assert_eq!(PLACEHOLDER_GIF.len(), 43);
        assert_eq!(&PLACEHOLDER_GIF[..6], b"GIF89a");
        assert_eq!(PLACEHOLDER_GIF[42], 0x3b);
    }

    #[test]
    fn test_placeholder_gif_encodes_cleanly() {
        let encoded = BASE64.encode(PLACEHOLDER_GIF);
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, PLACEHOLDER_GIF);
    }
}

//! Product types and normalization
//!
//! This module turns the untyped raw items produced by in-page extraction
//! rules into typed, comparable [`Product`] values. All normalization is
//! pure and total: malformed input yields `None` for the affected field,
//! never an error.

mod normalize;

pub use normalize::{absolute_url, parse_abv, parse_price, parse_size};

use crate::site::SiteDefinition;
use serde::Deserialize;

/// A field that an extraction rule may return as either a number or a string
///
/// Site rules run in the page and return whatever the DOM gave them; a price
/// may be `129.5` on one site and `"€ 129,50"` on the next.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

/// The transient shape produced by an extraction rule for one item node
///
/// All fields are optional; the normalizer decides what survives.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    pub name: Option<String>,
    pub price: Option<RawField>,
    pub abv: Option<RawField>,
    pub size: Option<RawField>,
    pub url: Option<String>,
    pub img: Option<String>,
    pub available: Option<bool>,
}

/// A normalized, validated product listing
///
/// Created per crawl cycle from one [`RawItem`]; immutable except for the
/// later currency-conversion attachment; discarded after publish/persist.
#[derive(Debug, Clone)]
pub struct Product {
    /// Slug of the owning site
    pub site: String,

    /// Display name of the owning site (for the publisher)
    pub site_name: String,

    /// Currency code of `price`
    pub currency: String,

    pub name: String,

    /// Price in the site's local currency
    pub price: Option<f64>,

    /// Best-effort USD estimate attached by the currency converter
    pub price_usd: Option<f64>,

    /// Alcohol by volume, percent
    pub abv: Option<f64>,

    /// Bottle size in milliliters
    pub size: Option<f64>,

    /// Absolute product URL; the dedup key
    pub url: String,

    /// Absolute image URL
    pub img: Option<String>,
}

impl Product {
    /// Normalizes one raw item against its site definition
    ///
    /// Returns `None` when the item fails validation: a missing or
    /// non-absolutizable URL, or an implausible size (a present size must
    /// exceed 100 ml — this guards against mis-parsed non-volume numbers
    /// like "70%" being read as 70 ml).
    pub fn from_raw(site: &SiteDefinition, raw: RawItem) -> Option<Self> {
        let url = absolute_url(raw.url.as_deref().unwrap_or(""), &site.slug)?;

        let price = raw.price.map(|field| match field {
            RawField::Number(n) => n,
            RawField::Text(s) => parse_price(&s, site.euro_separator, site.vat_rate),
        });

        let abv = raw.abv.and_then(|field| match field {
            RawField::Number(n) => Some(n),
            RawField::Text(s) => parse_abv(&s),
        });

        let size = raw.size.and_then(|field| match field {
            RawField::Number(n) => Some(n),
            RawField::Text(s) => parse_size(&s),
        });

        if let Some(ml) = size {
            if ml <= 100.0 {
                return None;
            }
        }

        let img = raw.img.as_deref().and_then(|i| absolute_url(i, &site.slug));

        Some(Self {
            site: site.slug.clone(),
            site_name: site.display_name().to_string(),
            currency: site.currency.clone(),
            name: raw.name.unwrap_or_default(),
            price,
            price_usd: None,
            abv,
            size,
            url,
            img,
        })
    }
}

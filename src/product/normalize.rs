//! Pure normalization functions for raw extracted fields
//!
//! Every function here is deterministic, does no I/O and never panics on
//! malformed input. Parsing is forgiving by design: these strings come from
//! arbitrary retail pages and change without notice.

use regex::Regex;
use std::sync::OnceLock;

fn size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\d.,]+)\s?([[:alpha:]]+)$").expect("valid size regex"))
}

fn liter_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(l|lt|ltr|ltrs|liter|liters|litre|litres)$").expect("valid liter regex"))
}

/// Parses a size string (e.g. "700ml", "50cl", "0.7 ltr") into milliliters
///
/// The input must look like `<number><unit>` with an optional single space;
/// the number accepts either `.` or `,` as its decimal mark. Units
/// containing "cl" scale by 10, liter-like units by 1000, and any other
/// alphabetic unit is assumed to already be milliliters. Anything else
/// returns `None`.
pub fn parse_size(raw: &str) -> Option<f64> {
    let captures = size_pattern().captures(raw.trim())?;

    let number = captures[1].trim().replace(',', ".");
    let size: f64 = number.parse().ok()?;

    let unit = captures[2].trim().to_lowercase();
    if unit.contains("cl") {
        Some(size * 10.0)
    } else if liter_pattern().is_match(&unit) {
        Some(size * 1000.0)
    } else {
        Some(size)
    }
}

/// Parses an ABV string (e.g. "45,8%") into a bare percentage number
///
/// Commas become decimal points, then everything except digits and the
/// decimal point is stripped. Empty or unparseable input yields `None`.
pub fn parse_abv(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }

    let cleaned: String = raw
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned.parse().ok()
}

/// Parses a price string into a number, minding the site's separator
/// convention and optionally recomputing a VAT-exclusive price
///
/// The strip is two-pass, and the order matters: first every thousands
/// separator is removed (comma normally, period when `euro_separator`),
/// then everything but digits and the decimal mark. A single-pass regex
/// would mangle thousand-separated prices like "1,234.56". With
/// `euro_separator` the surviving commas become periods before the cast.
///
/// When `vat_rate > 1` the price is recomputed as excl-VAT and rounded to
/// two decimals.
pub fn parse_price(raw: &str, euro_separator: bool, vat_rate: f64) -> f64 {
    let (separator, decimal) = if euro_separator { ('.', ',') } else { (',', '.') };

    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| *c != separator)
        .filter(|c| c.is_ascii_digit() || *c == decimal)
        .collect();

    let normalized = if euro_separator {
        stripped.replace(',', ".")
    } else {
        stripped
    };

    let mut price: f64 = normalized.parse().unwrap_or(0.0);

    if vat_rate > 1.0 {
        price = (price / vat_rate * 100.0).round() / 100.0;
    }

    price
}

/// Resolves a possibly relative URL against a site domain
///
/// A path with exactly one leading slash gets the conventional
/// `https://www.<domain>` prefix; a protocol-relative path (two slashes)
/// gets a bare `https:`. Fully-qualified http(s) URLs pass through
/// unchanged. Anything else (other schemes, fragments, empty input) is
/// rejected.
pub fn absolute_url(raw: &str, domain: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with("//") {
        return Some(format!("https:{raw}"));
    }

    if raw.starts_with('/') {
        return Some(format!("https://www.{domain}{raw}"));
    }

    if raw.starts_with("http") {
        return Some(raw.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_milliliters() {
        assert_eq!(parse_size("700ml"), Some(700.0));
        assert_eq!(parse_size("700 ml"), Some(700.0));
    }

    #[test]
    fn test_parse_size_centiliters() {
        assert_eq!(parse_size("70cl"), Some(700.0));
        assert_eq!(parse_size("70 cl"), Some(700.0));
    }

    #[test]
    fn test_parse_size_liters() {
        assert_eq!(parse_size("0.7 ltr"), Some(700.0));
        assert_eq!(parse_size("0,7 liter"), Some(700.0));
        assert_eq!(parse_size("1 litre"), Some(1000.0));
        assert_eq!(parse_size("0.7l"), Some(700.0));
    }

    #[test]
    fn test_parse_size_unknown_unit_is_milliliters() {
        // Unknown alphabetic units are assumed to already be ml
        assert_eq!(parse_size("700cc"), Some(700.0));
    }

    #[test]
    fn test_parse_size_garbage() {
        assert_eq!(parse_size("garbage"), None);
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("ml700"), None);
        assert_eq!(parse_size("70% vol"), None);
    }

    #[test]
    fn test_parse_abv() {
        assert_eq!(parse_abv("45,8%"), Some(45.8));
        assert_eq!(parse_abv("45.8 % vol"), Some(45.8));
        assert_eq!(parse_abv("abv: 46"), Some(46.0));
        assert_eq!(parse_abv(""), None);
        assert_eq!(parse_abv("n/a"), None);
    }

    #[test]
    fn test_parse_price_period_decimal() {
        assert_eq!(parse_price("1,234.56", false, 1.0), 1234.56);
        assert_eq!(parse_price("$129.95", false, 1.0), 129.95);
        assert_eq!(parse_price("12,345,678.90", false, 1.0), 12_345_678.90);
    }

    #[test]
    fn test_parse_price_euro_separator() {
        assert_eq!(parse_price("1.234,56", true, 1.0), 1234.56);
        assert_eq!(parse_price("€ 129,95", true, 1.0), 129.95);
    }

    #[test]
    fn test_parse_price_vat_exclusive() {
        // 120 incl. 20% VAT is exactly 100 excl.
        assert_eq!(parse_price("120", false, 1.2), 100.0);
        // Rounded to two decimals
        assert_eq!(parse_price("100", false, 1.21), 82.64);
    }

    #[test]
    fn test_parse_price_unparseable_is_zero() {
        assert_eq!(parse_price("call us", false, 1.0), 0.0);
    }

    #[test]
    fn test_absolute_url_single_slash() {
        assert_eq!(
            absolute_url("/p/1", "example.com"),
            Some("https://www.example.com/p/1".to_string())
        );
    }

    #[test]
    fn test_absolute_url_protocol_relative() {
        assert_eq!(
            absolute_url("//cdn.example.com/x.png", "example.com"),
            Some("https://cdn.example.com/x.png".to_string())
        );
    }

    #[test]
    fn test_absolute_url_passthrough() {
        assert_eq!(
            absolute_url("https://other.example.org/p", "example.com"),
            Some("https://other.example.org/p".to_string())
        );
        assert_eq!(
            absolute_url("http://other.example.org/p", "example.com"),
            Some("http://other.example.org/p".to_string())
        );
    }

    #[test]
    fn test_absolute_url_rejected() {
        assert_eq!(absolute_url("ftp://x", "example.com"), None);
        assert_eq!(absolute_url("javascript:void(0)", "example.com"), None);
        assert_eq!(absolute_url("", "example.com"), None);
        assert_eq!(absolute_url("p/relative", "example.com"), None);
    }
}

//! Site definitions: declarative descriptions of crawl targets
//!
//! A site definition is pure data: identity and display metadata, currency
//! and VAT conventions for price parsing, pacing hints for the scheduler,
//! a DOM selector identifying item nodes, and an extraction rule.
//!
//! The extraction rule is not a Rust closure. It runs inside the headless
//! browser's own JavaScript context, where no host-process state is
//! reachable, so it is carried as data: a list of declared parameter names
//! (up to three: element, index, node list) plus the function body source.
//! The page assembles it with `new Function(...)` and maps it over the
//! selector matches.

use serde::Deserialize;

/// Default result cap per crawl cycle
pub const DEFAULT_LIMIT: usize = 25;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_vat_rate() -> f64 {
    1.0
}

fn default_category() -> String {
    "Uncategorized".to_string()
}

fn default_rule_params() -> Vec<String> {
    vec!["el".to_string()]
}

/// One crawl target with its own extraction rule and metadata
///
/// Loaded once at process start from the `[[sites]]` entries of the config
/// file and never mutated afterwards; runtime pacing counters live in the
/// scheduler's own per-site state, not here.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteDefinition {
    /// Unique domain/slug identifying this site (e.g. "shop.example.com")
    pub slug: String,

    /// Human-readable display name
    #[serde(default)]
    pub name: Option<String>,

    /// Category label used by the publisher for grouping
    #[serde(default = "default_category")]
    pub category: String,

    /// ISO currency code of prices on this site
    pub currency: String,

    /// When true, prices use comma as the decimal mark and period as the
    /// thousands separator
    #[serde(rename = "euro-separator", default)]
    pub euro_separator: bool,

    /// Prices on the site include VAT at this rate; values > 1 trigger a
    /// VAT-exclusive recalculation during normalization
    #[serde(rename = "vat-rate", default = "default_vat_rate")]
    pub vat_rate: f64,

    /// Result cap per crawl cycle; 0 means unlimited
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// The page URL to crawl
    pub url: String,

    /// Optional cookie header sent with every request to this site
    #[serde(default)]
    pub cookies: Option<String>,

    /// Hidden sites are crawled but flagged for restricted publishing
    #[serde(default)]
    pub hidden: bool,

    /// Minimum re-crawl interval in scheduler ticks; 0 crawls every tick
    #[serde(default)]
    pub delay: u32,

    /// DOM selector matching one node per listed item
    pub selector: String,

    /// The per-item extraction rule
    pub rule: ExtractionRule,
}

impl SiteDefinition {
    /// Returns the display name, falling back to the slug
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.slug)
    }

    /// Builds the JavaScript expression evaluated in the page to run the
    /// extraction rule across all selector matches
    ///
    /// The rule is instantiated with `new Function` from its declared
    /// parameter names and body, then mapped over the node list. Nodes for
    /// which the rule returns a falsy value come back as `false` and are
    /// dropped by the executor.
    pub fn extraction_script(&self) -> String {
        let selector = serde_json::Value::String(self.selector.clone());
        let body = serde_json::Value::String(self.rule.body.clone());
        let params = self
            .rule
            .params
            .iter()
            .map(|p| serde_json::Value::String(p.clone()).to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "(() => {{\n\
             const rule = new Function({params}, {body});\n\
             const nodes = Array.from(document.querySelectorAll({selector}));\n\
             return nodes.map((el, i) => rule(el, i, nodes) || false);\n\
             }})()"
        )
    }
}

/// A serialized per-item extraction rule
///
/// Given one DOM node (plus its index and the full node list) the rule
/// returns either a raw-item object or a falsy value meaning "skip this
/// node". The rule must be pure: it sees only the page, never the host.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRule {
    /// Declared parameter names, 1 to 3 of (element, index, array)
    #[serde(default = "default_rule_params")]
    pub params: Vec<String>,

    /// The JavaScript function body source
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_site() -> SiteDefinition {
        toml::from_str(
            r#"
            slug = "shop.example.com"
            name = "Example Shop"
            currency = "EUR"
            url = "https://shop.example.com/new"
            selector = "div.product"
            rule = { params = ["el"], body = "return { name: el.innerText };" }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let site = sample_site();
        assert_eq!(site.limit, DEFAULT_LIMIT);
        assert_eq!(site.category, "Uncategorized");
        assert!((site.vat_rate - 1.0).abs() < f64::EPSILON);
        assert!(!site.euro_separator);
        assert!(!site.hidden);
        assert_eq!(site.delay, 0);
        assert!(site.cookies.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_slug() {
        let mut site = sample_site();
        assert_eq!(site.display_name(), "Example Shop");
        site.name = None;
        assert_eq!(site.display_name(), "shop.example.com");
    }

    #[test]
    fn test_extraction_script_embeds_rule() {
        let site = sample_site();
        let script = site.extraction_script();
        assert!(script.contains(r#"new Function("el", "return { name: el.innerText };")"#));
        assert!(script.contains(r#"document.querySelectorAll("div.product")"#));
    }

    #[test]
    fn test_extraction_script_escapes_quotes() {
        let mut site = sample_site();
        site.selector = r#"div[data-kind="product"]"#.to_string();
        site.rule.body = r#"return { name: el.querySelector("a").innerText };"#.to_string();
        let script = site.extraction_script();
        // Both strings must survive as valid JS string literals
        assert!(script.contains(r#""div[data-kind=\"product\"]""#));
        assert!(script.contains(r#"\"a\""#));
    }

    #[test]
    fn test_multi_param_rule() {
        let mut site = sample_site();
        site.rule.params = vec!["el".into(), "i".into(), "all".into()];
        let script = site.extraction_script();
        assert!(script.contains(r#"new Function("el", "i", "all","#));
    }
}

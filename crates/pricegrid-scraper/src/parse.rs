//! Field-level parsers: prices, currencies, stock wording, titles, URLs.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use pricegrid_core::StockState;

/// Price patterns in rough order of reliability: symbol-prefixed, then
/// code/word-suffixed, then trailing `$`.
static PRICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[$€£¥₹]\s*(\d+(?:,\d{3})*(?:\.\d{1,2})?)",
        r"(?i)(\d+(?:,\d{3})*(?:\.\d{1,2})?)\s*(?:USD|EUR|GBP|JPY|CAD|AUD|CHF|CNY|INR|dollars)",
        r"(\d+(?:,\d{3})*(?:\.\d{1,2})?)\s*\$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Currency markers checked in order; the first match wins. `US$` must come
/// before the bare `$` so it is not shadowed.
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("USD", "USD"),
    ("$", "USD"),
    ("€", "EUR"),
    ("EUR", "EUR"),
    ("£", "GBP"),
    ("GBP", "GBP"),
    ("¥", "JPY"),
    ("JPY", "JPY"),
    ("₹", "INR"),
    ("INR", "INR"),
];

/// Extract a price amount from free text.
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    for pattern in PRICE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            let raw = captures.get(1)?.as_str().replace(',', "");
            if let Ok(price) = raw.parse::<Decimal>() {
                return Some(price);
            }
        }
    }
    None
}

/// Infer an ISO currency code from symbols or codes found in price text.
#[must_use]
pub fn infer_currency(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    let upper = text.to_uppercase();
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, code)| *code)
}

const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "out of stock",
    "unavailable",
    "sold out",
    "backordered",
    "pre-order",
    "coming soon",
    "notify when available",
];

const IN_STOCK_PHRASES: &[&str] = &[
    "in stock",
    "available",
    "add to cart",
    "add to basket",
    "buy now",
    "purchase",
    "order now",
    "pickup today",
    "ship to store",
    "free shipping",
];

/// Infer stock state from availability wording.
///
/// Out-of-stock phrases are checked first: "currently unavailable" contains
/// "available", so the in-stock scan must not get first look.
#[must_use]
pub fn infer_stock_state(text: &str) -> StockState {
    if text.is_empty() {
        return StockState::Unknown;
    }
    let lower = text.to_lowercase();
    if OUT_OF_STOCK_PHRASES.iter().any(|p| lower.contains(p)) {
        return StockState::OutOfStock;
    }
    if IN_STOCK_PHRASES.iter().any(|p| lower.contains(p)) {
        return StockState::InStock;
    }
    StockState::Unknown
}

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
];

/// Trim, decode the common HTML entities, and collapse runs of whitespace.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut cleaned = WHITESPACE_RE.replace_all(text.trim(), " ").into_owned();
    for (entity, replacement) in HTML_ENTITIES {
        cleaned = cleaned.replace(entity, replacement);
    }
    cleaned
}

const RETAILER_SUFFIXES: &[&str] = &[
    " - Amazon.com",
    " | Amazon.com",
    " - Best Buy",
    " | Best Buy",
    " - Walmart",
    " | Walmart",
    " - Newegg.com",
    " | Newegg.com",
];

/// Strip one known retailer suffix from the tail of a title.
#[must_use]
pub fn strip_retailer_suffix(title: &str) -> &str {
    for suffix in RETAILER_SUFFIXES {
        if let Some(stripped) = title.strip_suffix(suffix) {
            return stripped.trim_end();
        }
    }
    title
}

/// Qualify a URL with a protocol when it is missing one.
///
/// Protocol-relative URLs get `https:`; bare hosts get `https://`. Bare
/// domain-relative paths (`/p/123`) carry no host and are rejected as
/// malformed rather than guessed.
#[must_use]
pub fn qualify_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_owned());
    }
    if let Some(rest) = url.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if url.starts_with('/') {
        return None;
    }
    if url.contains('.') && !url.contains(char::is_whitespace) {
        return Some(format!("https://{url}"));
    }
    None
}

/// Derive a display label for a retailer from a domain or raw name:
/// `"www.bestbuy.com"` → `"Bestbuy"`.
#[must_use]
pub fn retailer_label(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);
    let base = stripped.split('.').next().unwrap_or(stripped);

    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

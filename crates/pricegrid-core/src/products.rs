//! Canonical product types shared across the pipeline.
//!
//! [`RawProductRecord`] is the loosely-typed bag an extractor produces from one
//! page; [`ProductRecord`] is the canonical, currency-unified output shape.
//! Raw records keep structured and free-text variants of the price fields
//! because sources disagree about which one they can provide.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock availability of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockState {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockState {
    /// Parse one of the three canonical wire values; anything else is `None`.
    #[must_use]
    pub fn from_canonical(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(Self::InStock),
            "out_of_stock" => Some(Self::OutOfStock),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InStock => write!(f, "in_stock"),
            Self::OutOfStock => write!(f, "out_of_stock"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A retail channel candidate produced by whitelist resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Domain without scheme or `www.` prefix.
    pub domain: String,
    /// Channel type label (`marketplace`, `big_box`, ...).
    pub label: String,
    pub locale: String,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_reason: Option<String>,
}

/// One search-engine result for a channel-restricted query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Domain of the channel this hit was found on.
    pub channel: String,
    /// Confidence inherited from the channel whitelist entry.
    pub confidence: f64,
}

/// Loosely-typed product fields as one extractor found them on one page.
///
/// Produced once per page, consumed once by the normalizer, then discarded.
/// Every field is optional; the normalizer decides what is recoverable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProductRecord {
    pub retailer: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Structured price, when the source exposes one.
    pub price: Option<Decimal>,
    /// Free text the price may be buried in (`"$1,299.00 — free shipping"`).
    pub price_text: Option<String>,
    /// Structured pre-discount price.
    pub original_price: Option<Decimal>,
    pub original_price_text: Option<String>,
    /// ISO currency code, when the source exposes one.
    pub currency: Option<String>,
    /// Raw availability wording (`"Only 3 left in stock"`).
    pub availability_text: Option<String>,
    /// Canonical stock value if the source already provides one.
    pub stock_state: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub confidence: Option<f64>,
}

/// Canonical, deduplicated product listing.
///
/// After normalization `currency` always equals the pipeline's configured
/// target currency, and `price` is `None` only when no source price could be
/// parsed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub retailer: String,
    pub title: String,
    pub url: String,
    pub price: Option<Decimal>,
    pub currency: String,
    pub stock_state: StockState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub confidence: f64,
}

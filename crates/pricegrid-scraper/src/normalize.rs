//! Normalization from raw extractor output to canonical [`ProductRecord`]s.
//!
//! Field parsing is delegated to [`crate::parse`]; duplicate collapsing and
//! output ordering to [`crate::dedup`]. This module owns the per-record
//! recovery rules: which fields can be salvaged, and when a record is
//! dropped instead.

use chrono::Utc;
use pricegrid_core::{ProductRecord, RawProductRecord, StockState};

use crate::currency::CurrencyTable;
use crate::dedup;
use crate::domain::extract_domain;
use crate::parse;

/// Fuzzy title similarity above which two listings count as one product.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.8;

const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Normalize a batch of raw records into deduplicated canonical records,
/// priced in `target_currency` and ordered cheapest-first (records without
/// a price sort last).
///
/// Records that cannot be normalized are dropped and logged; one malformed
/// record never aborts the rest of the batch.
#[must_use]
pub fn normalize_records(
    raw_records: Vec<RawProductRecord>,
    target_currency: &str,
    rates: &CurrencyTable,
) -> Vec<ProductRecord> {
    let normalized: Vec<ProductRecord> = raw_records
        .into_iter()
        .filter_map(|raw| normalize_record(raw, target_currency, rates))
        .collect();

    let mut records = dedup::dedupe(normalized, TITLE_SIMILARITY_THRESHOLD);
    // Output ordering is re-applied after deduplication.
    records.sort_by(dedup::rank);
    records
}

fn normalize_record(
    raw: RawProductRecord,
    target_currency: &str,
    rates: &CurrencyTable,
) -> Option<ProductRecord> {
    // A canonical record needs a URL, and guessing one is off the table.
    let Some(url) = raw.url.as_deref().and_then(parse::qualify_url) else {
        tracing::warn!(
            title = raw.title.as_deref().unwrap_or("<none>"),
            "dropping raw record without a usable product URL"
        );
        return None;
    };

    // A missing title is recoverable from the URL's trailing path segment.
    let title = raw
        .title
        .as_deref()
        .map(|t| parse::strip_retailer_suffix(&parse::clean_text(t)).to_owned())
        .filter(|t| !t.is_empty());
    let title = match title.or_else(|| title_from_url(&url)) {
        Some(title) => title,
        None => {
            tracing::warn!(url, "dropping raw record with no recoverable title");
            return None;
        }
    };

    let mut currency = raw.currency.as_deref().map(str::to_uppercase);
    let mut price = raw.price;
    if price.is_none() {
        if let Some(text) = raw.price_text.as_deref() {
            price = parse::parse_price(text);
            if price.is_some() && currency.is_none() {
                currency = parse::infer_currency(text).map(str::to_owned);
            }
        }
    }
    let source_currency = currency.unwrap_or_else(|| target_currency.to_owned());

    let price = price.map(|p| rates.convert(p, &source_currency, target_currency));
    let original_price = raw
        .original_price
        .or_else(|| raw.original_price_text.as_deref().and_then(parse::parse_price))
        .map(|p| rates.convert(p, &source_currency, target_currency));

    let stock_state = raw
        .stock_state
        .as_deref()
        .and_then(StockState::from_canonical)
        .unwrap_or_else(|| {
            raw.availability_text
                .as_deref()
                .map_or(StockState::Unknown, parse::infer_stock_state)
        });

    let retailer = raw
        .retailer
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map_or_else(
            || parse::retailer_label(&extract_domain(&url)),
            parse::retailer_label,
        );

    let description = raw
        .description
        .as_deref()
        .map(parse::clean_text)
        .filter(|d| !d.is_empty());
    let image_url = raw.image_url.as_deref().and_then(parse::qualify_url);
    let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);

    Some(ProductRecord {
        retailer,
        title,
        url,
        price,
        currency: target_currency.to_owned(),
        stock_state,
        original_price,
        fetched_at: Utc::now(),
        description,
        image_url,
        confidence,
    })
}

/// Recover a readable title from the URL's last non-empty path segment.
fn title_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    let cleaned = parse::clean_text(&segment.replace(['-', '_', '+'], " "));
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;

//! Pluggable product extraction from fetched HTML.
//!
//! Extractors are tried in registration order; the first one that accepts
//! the page and produces a record wins. Extraction failures drop the page,
//! never the batch.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use pricegrid_core::RawProductRecord;

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-check on the URL/markup before committing to a full parse.
    fn can_handle(&self, url: &str, html: &str) -> bool;

    /// Pull a raw product record out of the page, if one is present.
    fn extract(&self, html: &str, url: &str) -> Option<RawProductRecord>;
}

/// The default extractor chain: structured data first, meta-tag fallback second.
#[must_use]
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![Box::new(JsonLdExtractor), Box::new(MetaTagExtractor)]
}

/// Run the chain against one page.
pub(crate) fn run_extractors(
    extractors: &[Box<dyn Extractor>],
    html: &str,
    url: &str,
) -> Option<RawProductRecord> {
    for extractor in extractors {
        if !extractor.can_handle(url, html) {
            continue;
        }
        if let Some(record) = extractor.extract(html, url) {
            tracing::debug!(url, extractor = extractor.name(), "extracted product record");
            return Some(record);
        }
    }
    None
}

static JSONLD_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// schema.org `Product` extraction from `application/ld+json` blocks.
pub struct JsonLdExtractor;

impl Extractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "jsonld"
    }

    fn can_handle(&self, _url: &str, html: &str) -> bool {
        html.contains("application/ld+json")
    }

    fn extract(&self, html: &str, url: &str) -> Option<RawProductRecord> {
        for cap in JSONLD_SCRIPT_RE.captures_iter(html) {
            let json_text = match cap.get(1) {
                Some(m) => m.as_str(),
                None => continue,
            };

            let value: Value = match serde_json::from_str(json_text) {
                Ok(v) => v,
                Err(_) => continue,
            };

            // Accept top-level object, array, or @graph container.
            let mut candidates: Vec<Value> = if value.is_array() {
                value.as_array().cloned().unwrap_or_default()
            } else {
                vec![value]
            };

            // Expand @graph containers: many sites wrap structured data
            // inside {"@graph": [...]} at the top level.
            let mut expanded = Vec::new();
            for item in &candidates {
                if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                    expanded.extend(graph.iter().cloned());
                }
            }
            candidates.extend(expanded);

            for item in candidates {
                if let Some(record) = jsonld_item_to_record(&item, url) {
                    return Some(record);
                }
            }
        }
        None
    }
}

/// Convert a single JSON-LD object to a raw record, if it is a `Product`.
fn jsonld_item_to_record(item: &Value, page_url: &str) -> Option<RawProductRecord> {
    if !has_type(item, "Product") {
        return None;
    }

    let title = item
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .filter(|t| !t.trim().is_empty())?;

    let offer = first_offer(item);
    let (price, currency, availability) = match &offer {
        Some(offer) => (
            offer
                .get("price")
                .and_then(decimal_from_value)
                .or_else(|| offer.get("lowPrice").and_then(decimal_from_value)),
            offer
                .get("priceCurrency")
                .and_then(Value::as_str)
                .map(str::to_owned),
            offer.get("availability").and_then(Value::as_str),
        ),
        None => (None, None, None),
    };

    let url = offer
        .as_ref()
        .and_then(|o| o.get("url").and_then(Value::as_str))
        .or_else(|| item.get("url").and_then(Value::as_str))
        .unwrap_or(page_url)
        .to_owned();

    Some(RawProductRecord {
        title: Some(title),
        url: Some(url),
        price,
        currency,
        stock_state: availability.and_then(stock_from_schema_availability),
        availability_text: availability.map(str::to_owned),
        description: item
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned),
        image_url: image_from_value(item.get("image")),
        ..RawProductRecord::default()
    })
}

/// `@type` may be a string or an array of strings.
fn has_type(item: &Value, wanted: &str) -> bool {
    match item.get("@type") {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

/// `offers` may be one object or an array; take the first usable one.
fn first_offer(item: &Value) -> Option<Value> {
    match item.get("offers") {
        Some(Value::Array(offers)) => offers.first().cloned(),
        Some(offer @ Value::Object(_)) => Some(offer.clone()),
        _ => None,
    }
}

/// Prices appear as JSON strings or numbers depending on the site.
fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// `"https://schema.org/InStock"` (or a bare `"InStock"`) → canonical value.
fn stock_from_schema_availability(availability: &str) -> Option<String> {
    let tail = availability.rsplit('/').next().unwrap_or(availability);
    match tail {
        "InStock" | "InStoreOnly" | "OnlineOnly" | "LimitedAvailability" => {
            Some("in_stock".to_owned())
        }
        "OutOfStock" | "SoldOut" | "Discontinued" => Some("out_of_stock".to_owned()),
        _ => None,
    }
}

/// `image` may be a string, an array of strings, or an `ImageObject`.
fn image_from_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(images) => images.first().and_then(Value::as_str).map(str::to_owned),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

/// Open Graph / microdata fallback for pages without JSON-LD.
pub struct MetaTagExtractor;

impl MetaTagExtractor {
    fn meta_content(document: &scraper::Html, selector: &str) -> Option<String> {
        let selector = scraper::Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_owned)
            .filter(|s| !s.trim().is_empty())
    }

    fn first_text(document: &scraper::Html, selector: &str) -> Option<String> {
        let selector = scraper::Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
    }
}

impl Extractor for MetaTagExtractor {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn can_handle(&self, _url: &str, _html: &str) -> bool {
        true
    }

    fn extract(&self, html: &str, url: &str) -> Option<RawProductRecord> {
        let document = scraper::Html::parse_document(html);

        let title = Self::meta_content(&document, r#"meta[property="og:title"]"#)
            .or_else(|| Self::first_text(&document, "title"));

        let price_text = Self::meta_content(&document, r#"meta[property="product:price:amount"]"#)
            .or_else(|| Self::meta_content(&document, r#"meta[property="og:price:amount"]"#))
            .or_else(|| {
                let selector = scraper::Selector::parse(r#"[itemprop="price"]"#).ok()?;
                document.select(&selector).next().and_then(|el| {
                    el.value()
                        .attr("content")
                        .map(str::to_owned)
                        .or_else(|| Some(el.text().collect::<String>()))
                })
            })
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        let price = price_text.as_deref().and_then(|t| t.parse::<Decimal>().ok());

        let currency = Self::meta_content(&document, r#"meta[property="product:price:currency"]"#)
            .or_else(|| Self::meta_content(&document, r#"meta[property="og:price:currency"]"#))
            .or_else(|| Self::meta_content(&document, r#"meta[itemprop="priceCurrency"]"#));

        // A page with neither a title nor a price is not a product page.
        if title.is_none() && price.is_none() && price_text.is_none() {
            return None;
        }

        Some(RawProductRecord {
            title,
            url: Some(url.to_owned()),
            price,
            // Keep the raw text too: a non-numeric amount still goes through
            // the normalizer's price-pattern matcher.
            price_text: price.is_none().then_some(price_text).flatten(),
            currency,
            availability_text: Self::meta_content(&document, r#"meta[property="og:availability"]"#)
                .or_else(|| Self::meta_content(&document, r#"meta[itemprop="availability"]"#)),
            description: Self::meta_content(&document, r#"meta[property="og:description"]"#)
                .or_else(|| Self::meta_content(&document, r#"meta[name="description"]"#)),
            image_url: Self::meta_content(&document, r#"meta[property="og:image"]"#),
            ..RawProductRecord::default()
        })
    }
}

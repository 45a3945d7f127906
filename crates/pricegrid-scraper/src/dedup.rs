//! Near-duplicate collapsing over fuzzy title similarity.
//!
//! Clustering is greedy, not transitive: a record is a duplicate as soon as
//! its title is similar enough to ANY previously accepted title. Three
//! titles A~B, B~C with A≁C can therefore land in one cluster depending on
//! rank order; the tests pin this down rather than pretending otherwise.

use std::cmp::Ordering;

use pricegrid_core::ProductRecord;

/// Canonical record ordering: cheapest first (absent price last, as if
/// infinite), then most confident. The sort is stable, so fully tied
/// records keep their input order.
pub(crate) fn rank(a: &ProductRecord, b: &ProductRecord) -> Ordering {
    let by_price = match (a.price, b.price) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_price.then_with(|| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    })
}

/// Collapse near-duplicate listings, keeping the best-ranked representative
/// of each cluster.
pub(crate) fn dedupe(records: Vec<ProductRecord>, threshold: f64) -> Vec<ProductRecord> {
    let mut ranked = records;
    ranked.sort_by(rank);

    let mut accepted: Vec<ProductRecord> = Vec::new();
    let mut accepted_titles: Vec<String> = Vec::new();

    for record in ranked {
        let candidate = comparison_title(&record.title);
        let duplicate = accepted_titles
            .iter()
            .any(|title| strsim::jaro_winkler(title, &candidate) > threshold);
        if duplicate {
            tracing::debug!(title = %record.title, retailer = %record.retailer, "dropping near-duplicate listing");
            continue;
        }
        accepted_titles.push(candidate);
        accepted.push(record);
    }

    accepted
}

/// Title form used for similarity: lowercased, punctuation stripped.
fn comparison_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

//! URL domain extraction.

/// Extracts the gating domain from a URL: the host, lowercased, with any
/// leading `www.` stripped.
///
/// Falls back to the lowercased input when it does not parse as a URL, so a
/// bare host string still maps onto a stable gate key.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| url.trim().to_ascii_lowercase());

    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_owned(),
        None => host,
    }
}

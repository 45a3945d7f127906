//! Channel whitelist resolution.
//!
//! The baseline [`StaticChannelSource`] serves a per-locale table loaded
//! from YAML. The [`ChannelSource`] trait is the seam where an LLM-backed
//! generator would plug in.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use pricegrid_core::ChannelInfo;

use crate::error::PipelineError;

const DEFAULT_LOCALE: &str = "US";

/// Domains containing any of these fragments are content sites, not retail
/// channels, and are filtered out of the table at load time.
const NON_RETAIL_FRAGMENTS: &[&str] = &["forum", "news", "blog", "wiki", "download"];

#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Resolve the retail channels to search for a keyword in a locale,
    /// best-first, at most `max_channels` entries.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if no channels can be resolved at all.
    async fn channels(
        &self,
        keyword: &str,
        locale: &str,
        max_channels: usize,
    ) -> Result<Vec<ChannelInfo>, PipelineError>;
}

/// One channel row in the YAML table; locale comes from the table key.
#[derive(Debug, Deserialize)]
struct ChannelEntry {
    domain: String,
    label: String,
    confidence: f64,
    #[serde(default)]
    candidate_reason: Option<String>,
}

pub struct StaticChannelSource {
    by_locale: HashMap<String, Vec<ChannelInfo>>,
}

impl StaticChannelSource {
    /// Load the channel table from a YAML file keyed by locale.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ChannelTableIo`] if the file cannot be read
    /// and [`PipelineError::ChannelTableParse`] if it is not a valid table.
    pub fn from_yaml_file(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::ChannelTableIo {
            path: path.to_path_buf(),
            source,
        })?;
        let table: HashMap<String, Vec<ChannelEntry>> =
            serde_yaml::from_str(&raw).map_err(|source| PipelineError::ChannelTableParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_entries(table))
    }

    /// Built-in fallback table for when no YAML file is available.
    #[must_use]
    pub fn builtin() -> Self {
        let entry = |domain: &str, label: &str, confidence: f64| ChannelEntry {
            domain: domain.to_owned(),
            label: label.to_owned(),
            confidence,
            candidate_reason: None,
        };
        let table = HashMap::from([
            (
                "US".to_owned(),
                vec![
                    entry("amazon.com", "marketplace", 0.9),
                    entry("bestbuy.com", "big_box", 0.9),
                    entry("walmart.com", "big_box", 0.9),
                    entry("target.com", "big_box", 0.8),
                    entry("newegg.com", "vertical_electronics", 0.9),
                    entry("bhphotovideo.com", "vertical_electronics", 0.8),
                ],
            ),
            (
                "UK".to_owned(),
                vec![
                    entry("amazon.co.uk", "marketplace", 0.9),
                    entry("currys.co.uk", "big_box", 0.9),
                    entry("argos.co.uk", "big_box", 0.8),
                    entry("johnlewis.com", "big_box", 0.8),
                ],
            ),
        ]);
        Self::from_entries(table)
    }

    fn from_entries(table: HashMap<String, Vec<ChannelEntry>>) -> Self {
        let by_locale = table
            .into_iter()
            .map(|(locale, entries)| {
                let mut channels: Vec<ChannelInfo> = entries
                    .into_iter()
                    .filter_map(|entry| {
                        let domain = normalize_channel_domain(&entry.domain)?;
                        Some(ChannelInfo {
                            domain,
                            label: entry.label,
                            locale: locale.clone(),
                            confidence: entry.confidence.clamp(0.0, 1.0),
                            candidate_reason: entry.candidate_reason,
                        })
                    })
                    .collect();
                channels.sort_by(|a, b| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                (locale, channels)
            })
            .collect();
        Self { by_locale }
    }

    /// Channels for a locale without the trait's error contract; unknown
    /// locales fall back to the US table.
    #[must_use]
    pub fn for_locale(&self, locale: &str) -> &[ChannelInfo] {
        self.by_locale
            .get(locale)
            .or_else(|| self.by_locale.get(DEFAULT_LOCALE))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = self.by_locale.keys().map(String::as_str).collect();
        locales.sort_unstable();
        locales
    }
}

/// Normalize and validate a whitelist domain: strip scheme and `www.`,
/// lowercase, reject anything that is not a plain hostname or that looks
/// like a content site.
fn normalize_channel_domain(raw: &str) -> Option<String> {
    let domain = raw
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    let domain = domain.trim_end_matches('/').to_ascii_lowercase();

    if domain.is_empty() || !domain.contains('.') || domain.contains(char::is_whitespace) {
        return None;
    }
    if NON_RETAIL_FRAGMENTS.iter().any(|f| domain.contains(f)) {
        return None;
    }
    Some(domain)
}

#[async_trait]
impl ChannelSource for StaticChannelSource {
    async fn channels(
        &self,
        _keyword: &str,
        locale: &str,
        max_channels: usize,
    ) -> Result<Vec<ChannelInfo>, PipelineError> {
        let channels = self.for_locale(locale);
        if channels.is_empty() {
            return Err(PipelineError::NoChannels(locale.to_owned()));
        }
        Ok(channels.iter().take(max_channels).cloned().collect())
    }
}

//! Per-channel product search.
//!
//! The baseline [`SerpApiSearch`] issues one site-restricted query per
//! channel through the SerpAPI endpoint, bounded by a global concurrency
//! gate analogous to the fetcher's domain gates. A failed channel search
//! contributes zero hits; it never fails the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;

use pricegrid_core::{ChannelInfo, SearchHit};

use crate::error::PipelineError;

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

#[async_trait]
pub trait ChannelSearch: Send + Sync {
    /// Search every channel for the keyword, returning up to `per_channel`
    /// product-page hits per channel. Individual channel failures are
    /// logged and skipped.
    async fn search(
        &self,
        keyword: &str,
        channels: &[ChannelInfo],
        per_channel: usize,
    ) -> Vec<SearchHit>;
}

pub struct SerpApiSearch {
    client: reqwest::Client,
    api_key: Option<String>,
    gate: Arc<Semaphore>,
    endpoint: String,
}

impl SerpApiSearch {
    /// Build a search client. Without an API key every search resolves to
    /// zero hits (with a warning) instead of failing the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Search`] if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        max_concurrent: usize,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_key,
            gate: Arc::new(Semaphore::new(max_concurrent.max(1))),
            endpoint: SERPAPI_ENDPOINT.to_owned(),
        })
    }

    /// Override the API endpoint; used by tests to point at a local server.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search_channel(
        &self,
        api_key: &str,
        keyword: &str,
        channel: &ChannelInfo,
        per_channel: usize,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let query = format!("{keyword} site:{}", channel.domain);
        let num = per_channel.clamp(1, 10).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api_key", api_key),
                ("engine", "google"),
                ("q", query.as_str()),
                ("num", num.as_str()),
                ("gl", channel.locale.to_lowercase().as_str()),
                ("hl", "en"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: SerpResponse = response.json().await?;
        Ok(body
            .organic_results
            .into_iter()
            .filter(|result| is_product_page(&result.link, &result.title))
            .take(per_channel)
            .map(|result| SearchHit {
                url: result.link,
                title: result.title,
                snippet: result.snippet,
                channel: channel.domain.clone(),
                confidence: channel.confidence,
            })
            .collect())
    }
}

#[async_trait]
impl ChannelSearch for SerpApiSearch {
    async fn search(
        &self,
        keyword: &str,
        channels: &[ChannelInfo],
        per_channel: usize,
    ) -> Vec<SearchHit> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("no search API key configured; channel search returns no hits");
            return Vec::new();
        };

        let searches = channels.iter().map(|channel| async {
            let _permit = match self.gate.acquire().await {
                Ok(permit) => permit,
                Err(_) => return Vec::new(),
            };
            match self
                .search_channel(api_key, keyword, channel, per_channel)
                .await
            {
                Ok(hits) => {
                    tracing::debug!(channel = %channel.domain, hits = hits.len(), "channel search complete");
                    hits
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.domain, error = %e, "channel search failed; skipping channel");
                    Vec::new()
                }
            }
        });

        futures::future::join_all(searches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpOrganicResult>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganicResult {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

const NON_PRODUCT_PATH_FRAGMENTS: &[&str] = &[
    "/blog/", "/news/", "/article/", "/forum/", "/help/", "/support/", "/about/", "/contact/",
    "/careers/", "/press/", "/legal/",
];

const PRODUCT_INDICATORS: &[&str] = &[
    "/product/",
    "/item/",
    "/p/",
    "/dp/",
    "/gp/product/",
    "buy",
    "shop",
    "purchase",
    "add to cart",
];

/// Heuristic filter keeping results that look like product pages.
pub(crate) fn is_product_page(url: &str, title: &str) -> bool {
    let url = url.to_lowercase();
    let title = title.to_lowercase();

    if NON_PRODUCT_PATH_FRAGMENTS.iter().any(|f| url.contains(f)) {
        return false;
    }
    PRODUCT_INDICATORS
        .iter()
        .any(|indicator| url.contains(indicator) || title.contains(indicator))
}

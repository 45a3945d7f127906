//! Rate-limited page fetcher.
//!
//! Fetches batches of URLs while holding per-domain concurrency gates.
//! Two retrieval strategies sit behind one interface: a plain HTTP GET
//! through the shared `reqwest` client, and a full render through a shared
//! headless browser. A browser that is unavailable or fails to initialize
//! downgrades the request to the HTTP strategy instead of failing the batch.

mod render;
mod robots;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::error::FetchError;
use crate::gate::DomainGates;
use crate::types::{FetchResult, FetchStrategy, FetchTarget};

use render::Renderer;
pub use robots::RobotsPolicy;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Concurrency cap applied per domain unless overridden.
    pub default_domain_limit: usize,
    /// Per-domain caps taking precedence over the default.
    pub domain_limits: HashMap<String, usize>,
    /// How long a rendered page gets to settle after navigation.
    pub browser_settle_ms: u64,
    pub navigation_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: "pricegrid/0.1 (product-aggregation)".to_owned(),
            default_domain_limit: 2,
            domain_limits: HashMap::new(),
            browser_settle_ms: 2000,
            navigation_timeout_secs: 30,
        }
    }
}

pub struct PageFetcher {
    http: reqwest::Client,
    gates: DomainGates,
    /// Lazily-launched shared renderer. `Some(None)` records a failed launch
    /// so every later browser request takes the same HTTP fallback path.
    renderer: OnceCell<Option<Renderer>>,
    config: FetcherConfig,
}

impl PageFetcher {
    /// Builds a fetcher with configured timeout, `User-Agent`, and per-domain
    /// concurrency limits. Redirects are followed.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        let gates = DomainGates::new(config.default_domain_limit, config.domain_limits.clone());
        Ok(Self {
            http,
            gates,
            renderer: OnceCell::new(),
            config,
        })
    }

    /// Fetches every target, returning exactly one result per input.
    ///
    /// Targets for the same domain contend on that domain's gate; targets for
    /// different domains run fully concurrently. Result order is not
    /// guaranteed to match input order. Individual failures (network errors,
    /// timeouts, non-2xx statuses) come back as `success: false` results —
    /// nothing is dropped and nothing escapes as an error.
    pub async fn fetch_all(&self, targets: Vec<FetchTarget>) -> Vec<FetchResult> {
        if targets.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = targets.len(), "fetching batch");
        futures::future::join_all(targets.into_iter().map(|target| self.fetch_one(target))).await
    }

    async fn fetch_one(&self, target: FetchTarget) -> FetchResult {
        let gate = self.gates.gate(target.domain());
        // The permit is held for the whole network exchange and released on
        // every path, including errors and timeouts.
        let _permit = match gate.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return FetchResult::failure(
                    target.url(),
                    target.strategy(),
                    "domain gate closed",
                );
            }
        };

        match target.strategy() {
            FetchStrategy::Http => self.fetch_http(target.url()).await,
            FetchStrategy::Browser => self.fetch_rendered(target.url()).await,
        }
    }

    async fn fetch_http(&self, url: &str) -> FetchResult {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "http fetch failed");
                return FetchResult::failure(url, FetchStrategy::Http, e.to_string());
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_owned()))
            })
            .collect();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(url, error = %e, "failed to read response body");
                return FetchResult::failure(url, FetchStrategy::Http, e.to_string());
            }
        };

        if status.is_success() {
            FetchResult {
                url: url.to_owned(),
                final_url,
                status_code: status.as_u16(),
                body,
                headers,
                strategy_used: FetchStrategy::Http,
                success: true,
                error: None,
            }
        } else {
            tracing::debug!(url, status = status.as_u16(), "non-2xx response");
            FetchResult {
                url: url.to_owned(),
                final_url,
                status_code: status.as_u16(),
                body,
                headers,
                strategy_used: FetchStrategy::Http,
                success: false,
                error: Some(format!("unexpected HTTP status {status}")),
            }
        }
    }

    async fn fetch_rendered(&self, url: &str) -> FetchResult {
        let Some(renderer) = self.renderer().await else {
            tracing::debug!(url, "renderer unavailable; using http strategy");
            return self.fetch_http(url).await;
        };

        let settle = Duration::from_millis(self.config.browser_settle_ms);
        let nav_timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        match renderer.render(url, settle, nav_timeout).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(url, error = %e, "browser fetch failed");
                FetchResult::failure(url, FetchStrategy::Browser, e.to_string())
            }
        }
    }

    /// Launches the shared browser on first use. A launch failure is cached
    /// so the fetcher does not retry the launch per request; the same
    /// fallback path then serves "absent" and "failed to initialize" alike.
    async fn renderer(&self) -> Option<&Renderer> {
        self.renderer
            .get_or_init(|| async {
                match Renderer::launch().await {
                    Ok(renderer) => Some(renderer),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "headless browser failed to initialize; browser fetches fall back to http"
                        );
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// Shuts down the shared browser, if one was launched.
    pub async fn shutdown(&self) {
        if let Some(Some(renderer)) = self.renderer.get() {
            renderer.shutdown().await;
        }
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;

//! Fetch request and result types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::extract_domain;

/// How a page should be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Plain GET through the shared HTTP client.
    Http,
    /// Full render through the shared headless browser.
    Browser,
}

/// One URL to fetch, with its derived domain and requested strategy.
///
/// The domain is computed once at construction and never changes; it is the
/// key the fetcher gates concurrency on.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    url: String,
    domain: String,
    strategy: FetchStrategy,
}

impl FetchTarget {
    #[must_use]
    pub fn new(url: impl Into<String>, strategy: FetchStrategy) -> Self {
        let url = url.into();
        let domain = extract_domain(&url);
        Self {
            url,
            domain,
            strategy,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }
}

/// Outcome of one fetch attempt. Created once per attempt, never mutated
/// after return; every input target produces exactly one of these.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    /// URL after redirects; equals `url` when the fetch never left the gate.
    pub final_url: String,
    /// `0` when no HTTP exchange completed (network error, timeout).
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub strategy_used: FetchStrategy,
    pub success: bool,
    pub error: Option<String>,
}

impl FetchResult {
    pub(crate) fn failure(
        url: impl Into<String>,
        strategy_used: FetchStrategy,
        error: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status_code: 0,
            body: String::new(),
            headers: HashMap::new(),
            strategy_used,
            success: false,
            error: Some(error.into()),
        }
    }
}

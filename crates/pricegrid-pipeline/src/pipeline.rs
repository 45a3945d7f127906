//! The pipeline orchestrator: whitelist → search → fetch → extract → normalize.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use pricegrid_cache::{cache_key, MemoryBackend, ProductCache, SqliteBackend, TieredCache};
use pricegrid_core::{AppConfig, ChannelInfo, ProductRecord, StockState};
use pricegrid_scraper::{
    normalize_records, CurrencyTable, FetchStrategy, FetchTarget, FetcherConfig, PageFetcher,
};

use crate::error::PipelineError;
use crate::extract::{self, Extractor};
use crate::search::{ChannelSearch, SerpApiSearch};
use crate::whitelist::{ChannelSource, StaticChannelSource};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub target_currency: String,
    pub max_results_per_channel: usize,
    pub max_search_results: usize,
    pub max_channels: usize,
    pub whitelist_ttl_secs: u64,
    pub product_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_currency: "USD".to_owned(),
            max_results_per_channel: 5,
            max_search_results: 20,
            max_channels: 20,
            whitelist_ttl_secs: 86_400,
            product_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    pub locale: String,
    /// Caps the returned list; falls back to the configured maximum.
    pub max_results: Option<usize>,
    pub include_out_of_stock: bool,
    /// Fetch product pages through the rendering strategy.
    pub render: bool,
}

impl SearchRequest {
    #[must_use]
    pub fn new(keyword: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            locale: locale.into(),
            max_results: None,
            include_out_of_stock: true,
            render: false,
        }
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub query: String,
    pub records: Vec<ProductRecord>,
    pub channels_used: Vec<String>,
    pub from_cache: bool,
    pub search_time_ms: u64,
}

/// The pipeline with the baseline collaborator implementations plugged in.
pub type DefaultPipeline = ProductPipeline<StaticChannelSource, SerpApiSearch>;

pub struct ProductPipeline<W, S> {
    channels: W,
    search: S,
    fetcher: Arc<PageFetcher>,
    cache: Arc<ProductCache>,
    extractors: Vec<Box<dyn Extractor>>,
    rates: CurrencyTable,
    config: PipelineConfig,
}

impl<W: ChannelSource, S: ChannelSearch> ProductPipeline<W, S> {
    pub fn new(
        channels: W,
        search: S,
        fetcher: Arc<PageFetcher>,
        cache: Arc<ProductCache>,
        extractors: Vec<Box<dyn Extractor>>,
        rates: CurrencyTable,
        config: PipelineConfig,
    ) -> Self {
        Self {
            channels,
            search,
            fetcher,
            cache,
            extractors,
            rates,
            config,
        }
    }

    /// Run one aggregation pass for a keyword.
    ///
    /// Per-stage failures degrade item by item; the pass only errors when no
    /// channels resolve at all.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoChannels`] if whitelist resolution comes
    /// back empty for the locale.
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchOutcome, PipelineError> {
        let started = Instant::now();
        tracing::info!(keyword = %request.keyword, locale = %request.locale, "pipeline pass started");

        let channels = self
            .resolve_channels(&request.keyword, &request.locale)
            .await?;
        let channels_used: Vec<String> = channels.iter().map(|c| c.domain.clone()).collect();

        let mode = if request.render { "render" } else { "http" };
        let product_key = cache_key("products", &[&request.keyword, &request.locale, mode]);

        if let Some(value) = self.cache.get(&product_key).await {
            match serde_json::from_value::<Vec<ProductRecord>>(value) {
                Ok(records) => {
                    tracing::info!(keyword = %request.keyword, count = records.len(), "serving cached product list");
                    return Ok(SearchOutcome {
                        query: request.keyword.clone(),
                        records: self.finalize(records, request),
                        channels_used,
                        from_cache: true,
                        search_time_ms: elapsed_ms(started),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cached product list failed to decode; refetching");
                }
            }
        }

        let hits = self
            .search
            .search(
                &request.keyword,
                &channels,
                self.config.max_results_per_channel,
            )
            .await;
        tracing::info!(keyword = %request.keyword, hits = hits.len(), "channel search complete");

        if hits.is_empty() {
            return Ok(SearchOutcome {
                query: request.keyword.clone(),
                records: Vec::new(),
                channels_used,
                from_cache: false,
                search_time_ms: elapsed_ms(started),
            });
        }

        let strategy = if request.render {
            FetchStrategy::Browser
        } else {
            FetchStrategy::Http
        };
        let confidence_by_url: HashMap<&str, f64> = hits
            .iter()
            .map(|hit| (hit.url.as_str(), hit.confidence))
            .collect();
        let targets: Vec<FetchTarget> = hits
            .iter()
            .map(|hit| FetchTarget::new(hit.url.clone(), strategy))
            .collect();

        let pages = self.fetcher.fetch_all(targets).await;

        let mut raw_records = Vec::new();
        for page in &pages {
            if !page.success {
                continue;
            }
            let Some(mut raw) = extract::run_extractors(&self.extractors, &page.body, &page.url)
            else {
                tracing::debug!(url = %page.url, "no extractor produced a record");
                continue;
            };
            if raw.url.is_none() {
                raw.url = Some(page.url.clone());
            }
            if raw.confidence.is_none() {
                raw.confidence = confidence_by_url.get(page.url.as_str()).copied();
            }
            raw_records.push(raw);
        }
        tracing::info!(
            fetched = pages.len(),
            extracted = raw_records.len(),
            "extraction complete"
        );

        let records = normalize_records(raw_records, &self.config.target_currency, &self.rates);

        match serde_json::to_value(&records) {
            Ok(value) => {
                self.cache
                    .set(&product_key, &value, self.config.product_ttl_secs)
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "product list not cacheable");
            }
        }

        Ok(SearchOutcome {
            query: request.keyword.clone(),
            records: self.finalize(records, request),
            channels_used,
            from_cache: false,
            search_time_ms: elapsed_ms(started),
        })
    }

    #[must_use]
    pub fn channel_source(&self) -> &W {
        &self.channels
    }

    /// Robots policy passthrough for callers that want the advisory signal.
    pub async fn check_policy(&self, domain: &str) -> pricegrid_scraper::RobotsPolicy {
        self.fetcher.check_policy(domain).await
    }

    /// Releases the shared renderer, if one was launched.
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    fn finalize(&self, mut records: Vec<ProductRecord>, request: &SearchRequest) -> Vec<ProductRecord> {
        if !request.include_out_of_stock {
            records.retain(|r| r.stock_state != StockState::OutOfStock);
        }
        records.truncate(request.max_results.unwrap_or(self.config.max_search_results));
        records
    }

    async fn resolve_channels(
        &self,
        keyword: &str,
        locale: &str,
    ) -> Result<Vec<ChannelInfo>, PipelineError> {
        let key = cache_key("whitelist", &[keyword, locale]);

        if let Some(value) = self.cache.get(&key).await {
            if let Ok(channels) = serde_json::from_value::<Vec<ChannelInfo>>(value) {
                if !channels.is_empty() {
                    tracing::debug!(keyword, locale, "using cached whitelist");
                    return Ok(channels);
                }
            }
        }

        let channels = self
            .channels
            .channels(keyword, locale, self.config.max_channels)
            .await?;
        if channels.is_empty() {
            return Err(PipelineError::NoChannels(locale.to_owned()));
        }

        if let Ok(value) = serde_json::to_value(&channels) {
            self.cache
                .set(&key, &value, self.config.whitelist_ttl_secs)
                .await;
        }
        Ok(channels)
    }
}

impl DefaultPipeline {
    /// Assemble the default pipeline from application config: SQLite-backed
    /// tiered cache, rate-limited fetcher, static whitelist (builtin table
    /// when the YAML file is unavailable), SerpAPI search, and the default
    /// extractor chain.
    ///
    /// Returns the pipeline together with the cache handle so the caller
    /// can schedule sweeps and expose stats.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the cache database or an HTTP client
    /// cannot be initialized.
    pub async fn from_config(
        config: &AppConfig,
    ) -> Result<(Self, Arc<ProductCache>), PipelineError> {
        let durable = SqliteBackend::connect(&config.cache_database_url).await?;
        let fast = config.fast_cache_enabled.then(MemoryBackend::new);
        let cache = Arc::new(TieredCache::new(fast, durable));

        let fetcher = Arc::new(PageFetcher::new(FetcherConfig {
            request_timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            default_domain_limit: config.per_domain_limit,
            domain_limits: HashMap::new(),
            browser_settle_ms: config.browser_settle_ms,
            navigation_timeout_secs: config.navigation_timeout_secs,
        })?);

        let channels = match StaticChannelSource::from_yaml_file(&config.channels_path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(
                    path = %config.channels_path.display(),
                    error = %e,
                    "channel table unavailable; using builtin fallback table"
                );
                StaticChannelSource::builtin()
            }
        };

        let search = SerpApiSearch::new(
            config.serpapi_key.clone(),
            config.search_timeout_secs,
            &config.user_agent,
            config.max_concurrent_searches,
        )?;

        let pipeline_config = PipelineConfig {
            target_currency: config.target_currency.clone(),
            max_results_per_channel: config.max_results_per_channel,
            max_search_results: config.max_search_results,
            max_channels: config.max_channels,
            whitelist_ttl_secs: config.whitelist_ttl_secs,
            product_ttl_secs: config.product_ttl_secs,
        };

        let pipeline = Self::new(
            channels,
            search,
            fetcher,
            Arc::clone(&cache),
            extract::default_extractors(),
            CurrencyTable::default(),
            pipeline_config,
        );
        Ok((pipeline, cache))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

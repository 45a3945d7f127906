//! End-to-end pipeline pass against a local mock storefront.

use std::sync::Arc;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricegrid_cache::{MemoryBackend, ProductCache, SqliteBackend, TieredCache};
use pricegrid_core::{ChannelInfo, SearchHit, StockState};
use pricegrid_pipeline::{
    default_extractors, ChannelSearch, ChannelSource, PipelineConfig, PipelineError,
    ProductPipeline, SearchRequest,
};
use pricegrid_scraper::{CurrencyTable, FetcherConfig, PageFetcher};

struct FixedChannels(Vec<ChannelInfo>);

#[async_trait]
impl ChannelSource for FixedChannels {
    async fn channels(
        &self,
        _keyword: &str,
        _locale: &str,
        max_channels: usize,
    ) -> Result<Vec<ChannelInfo>, PipelineError> {
        Ok(self.0.iter().take(max_channels).cloned().collect())
    }
}

struct FixedSearch(Vec<SearchHit>);

#[async_trait]
impl ChannelSearch for FixedSearch {
    async fn search(
        &self,
        _keyword: &str,
        _channels: &[ChannelInfo],
        _per_channel: usize,
    ) -> Vec<SearchHit> {
        self.0.clone()
    }
}

fn channel(domain: &str) -> ChannelInfo {
    ChannelInfo {
        domain: domain.to_owned(),
        label: "big_box".to_owned(),
        locale: "US".to_owned(),
        confidence: 0.9,
        candidate_reason: None,
    }
}

fn hit(url: &str, channel: &str) -> SearchHit {
    SearchHit {
        url: url.to_owned(),
        title: String::new(),
        snippet: String::new(),
        channel: channel.to_owned(),
        confidence: 0.9,
    }
}

fn product_page(name: &str, price: &str, availability: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
        {{"@context": "https://schema.org", "@type": "Product",
          "name": "{name}",
          "offers": {{"price": "{price}", "priceCurrency": "USD",
                      "availability": "https://schema.org/{availability}"}}}}
        </script></head><body></body></html>"#
    )
}

async fn cache() -> Arc<ProductCache> {
    let durable = SqliteBackend::connect_with("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    Arc::new(TieredCache::new(Some(MemoryBackend::new()), durable))
}

async fn pipeline_for(hits: Vec<SearchHit>) -> ProductPipeline<FixedChannels, FixedSearch> {
    ProductPipeline::new(
        FixedChannels(vec![channel("a.example.com"), channel("b.example.com")]),
        FixedSearch(hits),
        Arc::new(PageFetcher::new(FetcherConfig::default()).unwrap()),
        cache().await,
        default_extractors(),
        CurrencyTable::default(),
        PipelineConfig::default(),
    )
}

#[tokio::test]
async fn full_pass_fetches_extracts_normalizes_and_dedupes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/widget-a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("UltraWidget 3000", "29.99", "InStock")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/widget-b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("UltraWidget 3000 (2024)", "27.49", "InStock")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/other"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Completely Different Espresso Machine", "199.00", "OutOfStock")),
        )
        .mount(&server)
        .await;

    let hits = vec![
        hit(&format!("{}/p/widget-a", server.uri()), "a.example.com"),
        hit(&format!("{}/p/widget-b", server.uri()), "b.example.com"),
        hit(&format!("{}/p/other", server.uri()), "a.example.com"),
        // A dead link must not affect the rest of the batch.
        hit("http://127.0.0.1:9/p/dead", "a.example.com"),
    ];

    let pipeline = pipeline_for(hits).await;
    let outcome = pipeline
        .run(&SearchRequest::new("ultrawidget", "US"))
        .await
        .unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(outcome.channels_used.len(), 2);
    // The two near-identical widgets collapse; the cheaper one survives.
    assert_eq!(outcome.records.len(), 2);
    let widget = &outcome.records[0];
    assert_eq!(widget.price, Some("27.49".parse().unwrap()));
    assert_eq!(widget.currency, "USD");
    assert_eq!(widget.stock_state, StockState::InStock);
    // Ascending price puts the espresso machine second.
    assert_eq!(outcome.records[1].stock_state, StockState::OutOfStock);
}

#[tokio::test]
async fn second_pass_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Cached Widget", "10.00", "InStock")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hits = vec![hit(&format!("{}/p/cached", server.uri()), "a.example.com")];
    let pipeline = pipeline_for(hits).await;

    let request = SearchRequest::new("cached widget", "US");
    let first = pipeline.run(&request).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.records.len(), 1);

    // The mock's expect(1) guarantees this pass never re-fetches.
    let second = pipeline.run(&request).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.records[0].title, first.records[0].title);
}

#[tokio::test]
async fn out_of_stock_filter_and_result_cap_apply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/in"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Alpha Keyboard", "50.00", "InStock")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/out"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Omega Mouse Wireless", "30.00", "OutOfStock")),
        )
        .mount(&server)
        .await;

    let hits = vec![
        hit(&format!("{}/p/in", server.uri()), "a.example.com"),
        hit(&format!("{}/p/out", server.uri()), "b.example.com"),
    ];
    let pipeline = pipeline_for(hits).await;

    let mut request = SearchRequest::new("peripherals", "US");
    request.include_out_of_stock = false;
    let outcome = pipeline.run(&request).await.unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].stock_state, StockState::InStock);

    // Same keyword with the filter off is served from cache, uncapped.
    let mut relaxed = SearchRequest::new("peripherals", "US");
    relaxed.max_results = Some(1);
    let capped = pipeline.run(&relaxed).await.unwrap();
    assert!(capped.from_cache);
    assert_eq!(capped.records.len(), 1);
}

#[tokio::test]
async fn no_hits_yields_an_empty_outcome_not_an_error() {
    let pipeline = pipeline_for(Vec::new()).await;
    let outcome = pipeline.run(&SearchRequest::new("nothing", "US")).await.unwrap();
    assert!(outcome.records.is_empty());
    assert!(!outcome.from_cache);
    assert!(!outcome.channels_used.is_empty());
}

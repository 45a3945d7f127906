//! Orchestration of the product aggregation pipeline.
//!
//! Wires channel whitelisting, per-channel search, rate-limited fetching,
//! extraction, and normalization into one pass, with the tiered cache in
//! front of the expensive stages. Whitelisting, search, and extraction sit
//! behind traits so richer implementations (an LLM-backed whitelist, other
//! search APIs, retailer-specific extractors) plug in without touching the
//! orchestrator.

pub mod extract;
pub mod pipeline;
pub mod search;
pub mod whitelist;

mod error;

pub use error::PipelineError;
pub use extract::{default_extractors, Extractor, JsonLdExtractor, MetaTagExtractor};
pub use pipeline::{
    DefaultPipeline, PipelineConfig, ProductPipeline, SearchOutcome, SearchRequest,
};
pub use search::{ChannelSearch, SerpApiSearch};
pub use whitelist::{ChannelSource, StaticChannelSource};

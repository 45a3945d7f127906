use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read channel table {path}: {source}")]
    ChannelTableIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse channel table {path}: {source}")]
    ChannelTableParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no channels resolved for locale {0}")]
    NoChannels(String),

    #[error("search request failed: {0}")]
    Search(#[from] reqwest::Error),

    #[error(transparent)]
    Fetcher(#[from] pricegrid_scraper::FetchError),

    #[error(transparent)]
    Cache(#[from] pricegrid_cache::CacheError),
}

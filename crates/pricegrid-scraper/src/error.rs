use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("browser configuration error: {0}")]
    BrowserConfig(String),

    #[error("navigation timed out after {secs}s for {url}")]
    NavigationTimeout { url: String, secs: u64 },
}

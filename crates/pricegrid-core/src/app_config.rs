use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub cache_database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub channels_path: PathBuf,
    pub serpapi_key: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub per_domain_limit: usize,
    pub max_concurrent_searches: usize,
    pub browser_settle_ms: u64,
    pub navigation_timeout_secs: u64,
    pub fast_cache_enabled: bool,
    pub whitelist_ttl_secs: u64,
    pub product_ttl_secs: u64,
    pub max_results_per_channel: usize,
    pub max_search_results: usize,
    pub max_channels: usize,
    pub target_currency: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("channels_path", &self.channels_path)
            .field("cache_database_url", &self.cache_database_url)
            .field(
                "serpapi_key",
                &self.serpapi_key.as_ref().map(|_| "[redacted]"),
            )
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("per_domain_limit", &self.per_domain_limit)
            .field("max_concurrent_searches", &self.max_concurrent_searches)
            .field("browser_settle_ms", &self.browser_settle_ms)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("fast_cache_enabled", &self.fast_cache_enabled)
            .field("whitelist_ttl_secs", &self.whitelist_ttl_secs)
            .field("product_ttl_secs", &self.product_ttl_secs)
            .field("max_results_per_channel", &self.max_results_per_channel)
            .field("max_search_results", &self.max_search_results)
            .field("max_channels", &self.max_channels)
            .field("target_currency", &self.target_currency)
            .finish()
    }
}

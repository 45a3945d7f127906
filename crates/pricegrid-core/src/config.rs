use thiserror::Error;

use crate::app_config::{AppConfig, Environment};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingEnvVar(String),
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any env var holds a value that cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if any env var holds a value that cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got \"{other}\""),
            }),
        }
    };

    let cache_database_url = or_default(
        "PRICEGRID_CACHE_DB",
        "sqlite:pricegrid_cache.db?mode=rwc",
    );

    let env = parse_environment(&or_default("PRICEGRID_ENV", "development"));

    let bind_addr = parse_addr("PRICEGRID_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("PRICEGRID_LOG_LEVEL", "info");
    let channels_path = PathBuf::from(or_default(
        "PRICEGRID_CHANNELS_PATH",
        "./config/channels.yaml",
    ));
    let serpapi_key = lookup("SERPAPI_KEY").ok().filter(|s| !s.is_empty());

    let user_agent = or_default(
        "PRICEGRID_USER_AGENT",
        "pricegrid/0.1 (product-aggregation)",
    );
    let request_timeout_secs = parse_u64("PRICEGRID_REQUEST_TIMEOUT_SECS", "30")?;
    let search_timeout_secs = parse_u64("PRICEGRID_SEARCH_TIMEOUT_SECS", "10")?;
    let per_domain_limit = parse_usize("PRICEGRID_PER_DOMAIN_LIMIT", "2")?;
    let max_concurrent_searches = parse_usize("PRICEGRID_MAX_CONCURRENT_SEARCHES", "5")?;
    let browser_settle_ms = parse_u64("PRICEGRID_BROWSER_SETTLE_MS", "2000")?;
    let navigation_timeout_secs = parse_u64("PRICEGRID_NAVIGATION_TIMEOUT_SECS", "30")?;
    let fast_cache_enabled = parse_bool("PRICEGRID_FAST_CACHE", "true")?;
    let whitelist_ttl_secs = parse_u64("PRICEGRID_WHITELIST_TTL_SECS", "86400")?;
    let product_ttl_secs = parse_u64("PRICEGRID_PRODUCT_TTL_SECS", "3600")?;
    let max_results_per_channel = parse_usize("PRICEGRID_MAX_RESULTS_PER_CHANNEL", "5")?;
    let max_search_results = parse_usize("PRICEGRID_MAX_SEARCH_RESULTS", "20")?;
    let max_channels = parse_usize("PRICEGRID_MAX_CHANNELS", "20")?;
    let target_currency = or_default("PRICEGRID_TARGET_CURRENCY", "USD").to_uppercase();

    if per_domain_limit == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRICEGRID_PER_DOMAIN_LIMIT".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        cache_database_url,
        env,
        bind_addr,
        log_level,
        channels_path,
        serpapi_key,
        user_agent,
        request_timeout_secs,
        search_timeout_secs,
        per_domain_limit,
        max_concurrent_searches,
        browser_settle_ms,
        navigation_timeout_secs,
        fast_cache_enabled,
        whitelist_ttl_secs,
        product_ttl_secs,
        max_results_per_channel,
        max_search_results,
        max_channels,
        target_currency,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment("development"), Environment::Development);
        assert_eq!(parse_environment("test"), Environment::Test);
        assert_eq!(parse_environment("production"), Environment::Production);
        assert_eq!(parse_environment("unknown"), Environment::Development);
    }

    #[test]
    fn empty_env_builds_full_defaults() {
        let map = HashMap::new();
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.cache_database_url, "sqlite:pricegrid_cache.db?mode=rwc");
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.per_domain_limit, 2);
        assert_eq!(config.target_currency, "USD");
        assert!(config.fast_cache_enabled);
        assert!(config.serpapi_key.is_none());
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let mut map = HashMap::new();
        map.insert("PRICEGRID_BIND_ADDR", "not-an-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEGRID_BIND_ADDR"),
        );
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let mut map = HashMap::new();
        map.insert("PRICEGRID_REQUEST_TIMEOUT_SECS", "soon");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEGRID_REQUEST_TIMEOUT_SECS"),
        );
    }

    #[test]
    fn zero_domain_limit_is_rejected() {
        let mut map = HashMap::new();
        map.insert("PRICEGRID_PER_DOMAIN_LIMIT", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEGRID_PER_DOMAIN_LIMIT"),
        );
    }

    #[test]
    fn fast_cache_flag_parses_common_spellings() {
        for (raw, expected) in [("true", true), ("1", true), ("no", false), ("0", false)] {
            let mut map = HashMap::new();
            map.insert("PRICEGRID_FAST_CACHE", raw);
            let config = build_app_config(lookup_from_map(&map)).unwrap();
            assert_eq!(config.fast_cache_enabled, expected, "raw = {raw}");
        }
    }

    #[test]
    fn empty_serpapi_key_is_treated_as_absent() {
        let mut map = HashMap::new();
        map.insert("SERPAPI_KEY", "");
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert!(config.serpapi_key.is_none());
    }

    #[test]
    fn target_currency_is_uppercased() {
        let mut map = HashMap::new();
        map.insert("PRICEGRID_TARGET_CURRENCY", "eur");
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.target_currency, "EUR");
    }
}

mod app_config;
mod config;
mod products;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use products::{ChannelInfo, ProductRecord, RawProductRecord, SearchHit, StockState};

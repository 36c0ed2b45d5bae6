use std::str::FromStr;

use tracing::Level;

use crate::error::ConfigError;
use crate::logging::LoggingConfig;

pub const DEFAULT_QUEUE_STORE_URL: &str = "memory://local";

/// Where the queue store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStoreConfig {
    pub url: String,
}

impl Default for QueueStoreConfig {
    fn default() -> Self {
        Self { url: DEFAULT_QUEUE_STORE_URL.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub queue_store: QueueStoreConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(url) = lookup("QUEUE_STORE_URL") {
            config.queue_store.url = url;
        }
        if let Some(bind) = lookup("BIND_ADDRESS") {
            config.server.bind_address = bind;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_var("PORT", &port)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = Level::from_str(level.trim())
                .map_err(|_| ConfigError::InvalidValue { name: "LOG_LEVEL", value: level })?;
        }
        if let Some(json) = lookup("LOG_JSON") {
            config.logging.json = parse_var("LOG_JSON", &json)?;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

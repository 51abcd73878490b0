//! Environment-driven configuration for the API server and the polling agent

use std::env;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SIGNAL_API_URL: &str = "http://127.0.0.1:3000/signal";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid signal endpoint '{url}': {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported endpoint scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
}

/// Current deployment environment (`APP_ENV`, then `ENVIRONMENT`, default `sandbox`)
pub fn get_environment() -> String {
    env::var("APP_ENV")
        .or_else(|_| env::var("ENVIRONMENT"))
        .map(|e| e.trim().to_lowercase())
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "sandbox".to_string())
}

/// Optional Redis URL for the storage collaborator
pub fn get_redis_url() -> Option<String> {
    env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self { port }
    }
}

/// Settings the polling agent starts from before anything is persisted
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_url: String,
    pub poll_interval_seconds: u64,
    pub auto_fetch: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SIGNAL_API_URL.to_string(),
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            auto_fetch: true,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url =
            env::var("SIGNAL_API_URL").unwrap_or_else(|_| DEFAULT_SIGNAL_API_URL.to_string());
        let api_url = validate_endpoint(&api_url)?;

        let poll_interval_seconds = env::var("POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|i| i.parse().ok())
            .filter(|i: &u64| *i > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);

        let auto_fetch = env::var("AUTO_FETCH")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Ok(Self {
            api_url,
            poll_interval_seconds,
            auto_fetch,
        })
    }
}

/// Parse an endpoint URL, accepting only http(s)
pub fn validate_endpoint(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

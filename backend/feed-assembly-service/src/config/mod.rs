use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::media::DEFAULT_SCHEME_PREFIX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base URL of the temp URL service
    pub service_url: String,
    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_scheme_prefix")]
    pub scheme_prefix: String,
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
}

impl MediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_request_budget_ms")]
    pub request_budget_ms: u64,
    #[serde(default = "default_max_feed_size")]
    pub max_size: usize,
}

impl FeedConfig {
    pub fn request_budget(&self) -> Duration {
        Duration::from_millis(self.request_budget_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            request_budget_ms: default_request_budget_ms(),
            max_size: default_max_feed_size(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            media: MediaConfig {
                service_url: std::env::var("MEDIA_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8090".to_string()),
                timeout_secs: std::env::var("MEDIA_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_media_timeout_secs),
                scheme_prefix: scheme_prefix_or_default(
                    std::env::var("MEDIA_SCHEME_PREFIX").ok(),
                ),
                max_concurrent_chunks: std::env::var("MEDIA_MAX_CONCURRENT_CHUNKS")
                    .unwrap_or_else(|_| default_max_concurrent_chunks().to_string())
                    .parse()?,
            },
            feed: FeedConfig {
                request_budget_ms: std::env::var("FEED_REQUEST_BUDGET_MS")
                    .unwrap_or_else(|_| default_request_budget_ms().to_string())
                    .parse()?,
                max_size: std::env::var("FEED_MAX_SIZE")
                    .unwrap_or_else(|_| default_max_feed_size().to_string())
                    .parse()?,
            },
        })
    }
}

fn default_media_timeout_secs() -> u64 {
    resilience::media_service_config().duration.as_secs()
}

fn default_scheme_prefix() -> String {
    DEFAULT_SCHEME_PREFIX.to_string()
}

/// An empty prefix would match every string, plain URLs included
fn scheme_prefix_or_default(raw: Option<String>) -> String {
    raw.filter(|p| !p.trim().is_empty())
        .unwrap_or_else(default_scheme_prefix)
}

fn default_max_concurrent_chunks() -> usize {
    4
}

fn default_request_budget_ms() -> u64 {
    resilience::feed_request_config().duration.as_millis() as u64
}

fn default_max_feed_size() -> usize {
    50
}

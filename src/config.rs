use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket server
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string for the status sink and job store.
    /// When absent the server falls back to in-memory implementations.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent pipeline workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum pipeline attempts per job
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_workers() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl QueueConfig {
    /// Exponential backoff before re-attempt `attempt` (1-based):
    /// base * 2^(attempt-1), saturating.
    pub fn backoff_delay(&self, attempt: u32) -> std::time::Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_backoff_ms
            .saturating_mul(2u64.saturating_pow(exp));
        std::time::Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Simulated quote-fetch latency
    #[serde(default = "default_quote_latency_ms")]
    pub quote_latency_ms: u64,
    /// Simulated swap settlement latency (lower bound; jitter is added)
    #[serde(default = "default_swap_latency_ms")]
    pub swap_latency_ms: u64,
    /// Upper bound on any single provider call. 0 disables the timeout.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
}

fn default_quote_latency_ms() -> u64 {
    200
}

fn default_swap_latency_ms() -> u64 {
    2000
}

fn default_stage_timeout_ms() -> u64 {
    30_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            quote_latency_ms: default_quote_latency_ms(),
            swap_latency_ms: default_swap_latency_ms(),
            stage_timeout_ms: default_stage_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Grace window after a terminal state before the order's event
    /// history is discarded. Late subscribers inside the window still
    /// get a full replay; after it they see only new events.
    #[serde(default = "default_history_grace_secs")]
    pub history_grace_secs: u64,
}

fn default_history_grace_secs() -> u64 {
    60
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_grace_secs: default_history_grace_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/default.toml` (optional) with
    /// `SWAPLINE_`-prefixed environment overrides, e.g.
    /// `SWAPLINE_QUEUE__WORKERS=4`.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/default.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("SWAPLINE").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_queue_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.queue.workers, 10);
        assert_eq!(cfg.queue.max_attempts, 3);
        assert_eq!(cfg.queue.base_backoff_ms, 500);
        assert_eq!(cfg.events.history_grace_secs, 60);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.backoff_delay(1).as_millis(), 500);
        assert_eq!(cfg.backoff_delay(2).as_millis(), 1000);
        assert_eq!(cfg.backoff_delay(3).as_millis(), 2000);
    }
}

use crate::error::{Result, StarportError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_request_body_kb")]
    pub max_request_body_kb: usize,
    #[serde(default = "default_min_search_length")]
    pub min_search_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_enabled")]
    pub enabled: bool,
    #[serde(default = "default_feed_host")]
    pub host: String,
    #[serde(default = "default_feed_port")]
    pub port: u16,
    /// A receive that sees nothing for this long triggers a silent reconnect.
    #[serde(default = "default_recv_timeout")]
    pub recv_timeout_secs: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_max_backoff_exponent")]
    pub max_backoff_exponent: u32,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Largest shell radius visited, inclusive.
    #[serde(default = "default_max_shell_radius")]
    pub max_shell_radius: i32,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Reference data file. The bundled catalog is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub systems_path: Option<PathBuf>,
    #[serde(default)]
    pub stations_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_host() -> String {
    std::env::var("STARPORT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}
fn default_port() -> u16 {
    std::env::var("STARPORT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_request_body_kb() -> usize {
    64
}
fn default_min_search_length() -> usize {
    3
}
fn default_feed_enabled() -> bool {
    std::env::var("STARPORT_FEED_ENABLED")
        .ok()
        .map(|v| v == "true")
        .unwrap_or(true)
}
fn default_feed_host() -> String {
    std::env::var("STARPORT_FEED_HOST").unwrap_or_else(|_| "eddn-relay.elite-markets.net".to_string())
}
fn default_feed_port() -> u16 {
    std::env::var("STARPORT_FEED_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9500)
}
fn default_recv_timeout() -> u64 {
    300
}
fn default_backoff_base() -> u64 {
    15
}
fn default_max_backoff_exponent() -> u32 {
    6
}
fn default_max_frame_bytes() -> usize {
    512 * 1024
}
fn default_max_shell_radius() -> i32 {
    5
}
fn default_max_results() -> usize {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    std::env::var("STARPORT_LOG_FORMAT").unwrap_or_else(|_| "json".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_request_body_kb: default_max_request_body_kb(),
            min_search_length: default_min_search_length(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_feed_enabled(),
            host: default_feed_host(),
            port: default_feed_port(),
            recv_timeout_secs: default_recv_timeout(),
            backoff_base_secs: default_backoff_base(),
            max_backoff_exponent: default_max_backoff_exponent(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_shell_radius: default_max_shell_radius(),
            max_results: default_max_results(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl FeedConfig {
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_secs(self.recv_timeout_secs)
    }

    /// Wait before reconnect attempt `attempt`: base * 2^attempt, exponent capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.max_backoff_exponent);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        Duration::from_secs(self.backoff_base_secs.saturating_mul(factor))
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults.
    /// Env vars are applied last: env var > TOML file > defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    StarportError::Config(format!("failed to read config file {p}: {e}"))
                })?;
                toml::from_str(&content)
                    .map_err(|e| StarportError::Config(format!("failed to parse config: {e}")))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(v) = std::env::var("STARPORT_HOST") {
            self.server.host = v;
        }
        if let Some(v) = std::env::var("STARPORT_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.port = v;
        }

        // Feed
        if let Ok(v) = std::env::var("STARPORT_FEED_ENABLED") {
            self.feed.enabled = v == "true";
        }
        if let Ok(v) = std::env::var("STARPORT_FEED_HOST") {
            self.feed.host = v;
        }
        if let Some(v) = std::env::var("STARPORT_FEED_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.feed.port = v;
        }

        // Catalog
        if let Some(v) = std::env::var("STARPORT_CATALOG_PATH")
            .ok()
            .filter(|s| !s.is_empty())
        {
            self.catalog.path = Some(PathBuf::from(v));
        }

        // Logging
        if let Ok(v) = std::env::var("STARPORT_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            return Err(StarportError::Config(
                "search.max_results must be > 0".to_string(),
            ));
        }
        if self.search.max_shell_radius < 0 {
            return Err(StarportError::Config(
                "search.max_shell_radius must be >= 0".to_string(),
            ));
        }
        if self.feed.max_backoff_exponent >= u64::BITS {
            return Err(StarportError::Config(format!(
                "feed.max_backoff_exponent must be < {}",
                u64::BITS
            )));
        }
        if self.feed.max_frame_bytes == 0 {
            return Err(StarportError::Config(
                "feed.max_frame_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "/config/aqmon.yaml";

/// Top-level configuration for the aqmon agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sample_intervals: SampleIntervals,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub notifiers: Notifiers,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Upstream sensor-data service connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "UpstreamConfig::default_base_url")]
    pub base_url: String,
    /// Short connect timeout; upstream either answers quickly or not at all.
    #[serde(
        default = "UpstreamConfig::default_connect_timeout",
        with = "humantime_serde"
    )]
    pub connect_timeout: Duration,
    /// Longer overall timeout to tolerate slow upstream aggregation.
    #[serde(
        default = "UpstreamConfig::default_read_timeout",
        with = "humantime_serde"
    )]
    pub read_timeout: Duration,
}

impl UpstreamConfig {
    fn default_base_url() -> String {
        "https://www.simpleaq.org".to_string()
    }

    const fn default_connect_timeout() -> Duration {
        Duration::from_secs(5)
    }

    const fn default_read_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            connect_timeout: Self::default_connect_timeout(),
            read_timeout: Self::default_read_timeout(),
        }
    }
}

/// Retry policy for window fetches: exponential backoff bounded by total
/// elapsed time. One policy, applied to every upstream fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(
        default = "RetryConfig::default_initial_backoff",
        with = "humantime_serde"
    )]
    pub initial_backoff: Duration,
    #[serde(
        default = "RetryConfig::default_max_backoff",
        with = "humantime_serde"
    )]
    pub max_backoff: Duration,
    #[serde(
        default = "RetryConfig::default_max_elapsed",
        with = "humantime_serde"
    )]
    pub max_elapsed: Duration,
}

impl RetryConfig {
    const fn default_initial_backoff() -> Duration {
        Duration::from_secs(1)
    }

    const fn default_max_backoff() -> Duration {
        Duration::from_secs(10)
    }

    const fn default_max_elapsed() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Self::default_initial_backoff(),
            max_backoff: Self::default_max_backoff(),
            max_elapsed: Self::default_max_elapsed(),
        }
    }
}

/// Loop schedule configuration (with friendly duration parsing).
#[derive(Debug, Clone, Deserialize)]
pub struct SampleIntervals {
    /// Refresh loop (current snapshots, statistics, alert deltas).
    #[serde(
        default = "SampleIntervals::default_refresh",
        with = "humantime_serde"
    )]
    pub refresh: Duration,
    /// History loop (daily series over the lookback window).
    #[serde(
        default = "SampleIntervals::default_history",
        with = "humantime_serde"
    )]
    pub history: Duration,
}

impl SampleIntervals {
    const fn default_refresh() -> Duration {
        Duration::from_secs(600)
    }

    const fn default_history() -> Duration {
        Duration::from_secs(600)
    }
}

impl Default for SampleIntervals {
    fn default() -> Self {
        Self {
            refresh: Self::default_refresh(),
            history: Self::default_history(),
        }
    }
}

/// Lookback window shape for the historical aggregation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "HistoryConfig::default_chunk_days")]
    pub chunk_days: i64,
}

impl HistoryConfig {
    const fn default_lookback_days() -> i64 {
        7
    }

    const fn default_chunk_days() -> i64 {
        1
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            lookback_days: Self::default_lookback_days(),
            chunk_days: Self::default_chunk_days(),
        }
    }
}

/// Optional notifier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notifiers {
    /// Webhook receiving `{sensors: [...]}` alert batches.
    #[serde(default)]
    pub alert_webhook: Option<String>,
}

/// HTTP listener configuration (bind address).
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_bind")]
    pub bind: String,
}

impl HttpConfig {
    fn default_bind() -> String {
        "0.0.0.0:3001".to_string()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
        }
    }
}

/// Load configuration from YAML disk file, falling back to defaults + env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let target_path = if let Some(path) = path {
        path.to_path_buf()
    } else if let Ok(env_path) = env::var("AQMON_CONFIG") {
        PathBuf::from(env_path)
    } else {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    };

    let mut config = match try_parse_file(&target_path)? {
        Some(cfg) => {
            info!(path = %target_path.display(), "loaded configuration");
            cfg
        }
        None => {
            warn!(path = %target_path.display(), "config file not found; using built-in defaults");
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn try_parse_file(path: &Path) -> Result<Option<AppConfig>> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let cfg = serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse YAML config at {}", path.display()))?;
            Ok(Some(cfg))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read config file at {}", path.display()))
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(base_url) = env::var("AQMON_BASE_URL") {
        if !base_url.is_empty() {
            config.upstream.base_url = base_url;
        }
    }

    if let Ok(webhook) = env::var("AQMON_WEBHOOK_URL") {
        if !webhook.is_empty() {
            config.notifiers.alert_webhook = Some(webhook);
        }
    }
}

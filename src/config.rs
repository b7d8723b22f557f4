use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which reconciliation mode this deployment runs. Exactly one; the
/// two are never layered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum Mode {
    /// The backend aggregates and owns history; we fetch snapshots and
    /// optionally trigger live checks.
    #[serde(alias = "backend", alias = "Backend")]
    #[default]
    Backend,
    /// No backend: we probe the configured endpoints directly and own
    /// the history ledger ourselves.
    #[serde(
        alias = "self-probe",
        alias = "SelfProbe",
        alias = "self_probe",
        alias = "self probe"
    )]
    SelfProbe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatuswatchConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Base URL of the status backend (required in backend mode).
    pub api_base: Option<Url>,
    /// Rolling history window per service. Deployments run 30, 90, or
    /// 150 depending on their sampling cadence.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Seconds between authoritative status refreshes.
    #[serde(default = "default_status_interval")]
    pub status_interval: u64,
    /// Seconds between incident refreshes. Incidents change far less
    /// often than status, so this is decoupled from `status_interval`.
    #[serde(default = "default_incident_interval")]
    pub incident_interval: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Latency above which a successful probe counts as degraded
    /// (self-probe mode only), in milliseconds.
    #[serde(default = "default_degraded_threshold_ms")]
    pub degraded_threshold_ms: u64,
    #[serde(default)]
    pub live_check: LiveCheckConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "service", default = "default_services")]
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveCheckConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds to wait after initial load before the one-shot live
    /// check. Keeps every startup from front-loading backend cost.
    #[serde(default = "default_live_check_delay")]
    pub initial_delay: u64,
    /// Seconds to wait after a live check before re-fetching the
    /// authoritative snapshot, giving the backend time to persist the
    /// probe result into history.
    #[serde(default = "default_refetch_delay")]
    pub refetch_delay: u64,
}

impl Default for LiveCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: default_live_check_delay(),
            refetch_delay: default_refetch_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub dir: std::path::PathBuf,
    /// Seconds before a cached snapshot is considered stale at startup.
    #[serde(default = "default_cache_freshness")]
    pub freshness: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_cache_dir(),
            freshness: default_cache_freshness(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    /// Endpoint probed directly in self-probe mode. Unused in backend
    /// mode, where the backend decides what to check.
    pub url: Option<Url>,
}

fn default_history_window() -> usize {
    90
}

fn default_status_interval() -> u64 {
    120
}

fn default_incident_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_degraded_threshold_ms() -> u64 {
    2000
}

fn default_live_check_delay() -> u64 {
    8
}

fn default_refetch_delay() -> u64 {
    5
}

fn default_cache_dir() -> std::path::PathBuf {
    std::path::PathBuf::from(".statuswatch-cache")
}

fn default_cache_freshness() -> u64 {
    30
}

fn default_services() -> Vec<ServiceEntry> {
    ["Auth", "API", "Site", "Launcher"]
        .into_iter()
        .map(|name| ServiceEntry {
            name: name.to_string(),
            url: None,
        })
        .collect()
}

impl StatuswatchConfig {
    pub fn try_init() -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&crate::cli::get_cli_args().config)?;
        Self::try_init_from_string(&raw)
    }

    fn try_init_from_string(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_window == 0 {
            return Err(ConfigError::Invalid(
                "history_window must be at least 1".into(),
            ));
        }
        match self.mode {
            Mode::Backend => {
                if self.api_base.is_none() {
                    return Err(ConfigError::Invalid("backend mode requires api_base".into()));
                }
            }
            Mode::SelfProbe => {
                if let Some(entry) = self.services.iter().find(|s| s.url.is_none()) {
                    return Err(ConfigError::Invalid(format!(
                        "self-probe mode requires a url for every service, missing for {:?}",
                        entry.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Optional backend credential, taken from the environment so it
    /// never lives in the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("STATUSWATCH_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval)
    }

    pub fn incident_interval(&self) -> Duration {
        Duration::from_secs(self.incident_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn degraded_threshold(&self) -> Duration {
        Duration::from_millis(self.degraded_threshold_ms)
    }

    pub fn cache_freshness(&self) -> Duration {
        Duration::from_secs(self.cache.freshness)
    }
}

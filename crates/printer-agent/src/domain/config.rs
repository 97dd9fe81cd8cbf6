//! Runtime configuration of the agent process.
//!
//! Settings reach the process from three places, highest precedence first:
//!
//! 1. Command-line flags (each flag also reads a `PRINTER_AGENT_*` variable).
//! 2. The optional TOML settings file given with `--settings`.
//! 3. Built-in defaults.
//!
//! Each source is captured as an [`AgentSettings`] whose fields are all
//! optional.  Sources are layered with [`AgentSettings::or`] and the result is
//! validated once with [`AgentSettings::resolve`] into an [`AgentConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use printer_agent_core::domain::schedule::{DEFAULT_SYNC_TIME, DEFAULT_SYNC_TIMEZONE};
use printer_agent_core::{DailySchedule, ScheduleError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loopback address and port the web application expects the agent on.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9000";

/// Config document location when none is configured.
pub const DEFAULT_CONFIG_FILE: &str = "printer-config.json";

/// Default timeout for one call to the backend.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Default `tracing` filter when neither `RUST_LOG` nor `--log-level` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Browser origins allowed to call the HTTP API.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 5] = [
    "http://localhost:4200",
    "https://alpidi.com",
    "https://app.alpidi.com",
    "https://test.alpidi.com",
    "https://stage.alpidi.com",
];

/// Errors produced while validating the merged settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend URL is required (--backend-url or PRINTER_AGENT_BACKEND_URL)")]
    MissingBackendUrl,

    #[error("invalid bind address '{0}', expected IP:PORT")]
    InvalidBindAddress(String),

    #[error("remote timeout must be at least one second")]
    ZeroRemoteTimeout,

    #[error("invalid sync schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

/// One layer of settings.  `None` means "not provided by this source".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    pub bind: Option<String>,
    pub backend_url: Option<String>,
    pub config_file: Option<PathBuf>,
    pub sync_time: Option<String>,
    pub sync_timezone: Option<String>,
    pub remote_timeout_secs: Option<u64>,
    pub allowed_origins: Option<Vec<String>>,
    pub headless: Option<bool>,
    pub log_level: Option<String>,
}

impl AgentSettings {
    /// Fills every field `self` leaves unset from `lower`.
    pub fn or(self, lower: AgentSettings) -> AgentSettings {
        AgentSettings {
            bind: self.bind.or(lower.bind),
            backend_url: self.backend_url.or(lower.backend_url),
            config_file: self.config_file.or(lower.config_file),
            sync_time: self.sync_time.or(lower.sync_time),
            sync_timezone: self.sync_timezone.or(lower.sync_timezone),
            remote_timeout_secs: self.remote_timeout_secs.or(lower.remote_timeout_secs),
            allowed_origins: self.allowed_origins.or(lower.allowed_origins),
            headless: self.headless.or(lower.headless),
            log_level: self.log_level.or(lower.log_level),
        }
    }

    /// Applies defaults and validates the merged settings.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn resolve(self) -> Result<AgentConfig, ConfigError> {
        let bind = self.bind.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(bind.clone()))?;

        let backend_base_url = self
            .backend_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingBackendUrl)?;

        let schedule = DailySchedule::parse(
            self.sync_time.as_deref().unwrap_or(DEFAULT_SYNC_TIME),
            self.sync_timezone.as_deref().unwrap_or(DEFAULT_SYNC_TIMEZONE),
        )?;

        let timeout_secs = self
            .remote_timeout_secs
            .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroRemoteTimeout);
        }

        let allowed_origins = match self.allowed_origins {
            Some(origins) if !origins.is_empty() => origins,
            _ => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(AgentConfig {
            bind_addr,
            backend_base_url,
            config_file: self
                .config_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            schedule,
            remote_timeout: Duration::from_secs(timeout_secs),
            allowed_origins,
            force_headless: self.headless.unwrap_or(false),
        })
    }
}

/// Validated configuration the process runs with.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Address the HTTP API listens on.
    pub bind_addr: SocketAddr,
    /// Base URL of the central backend, e.g. `https://api.example.com`.
    pub backend_base_url: String,
    /// Location of the persisted configuration document.
    pub config_file: PathBuf,
    /// When the daily backend sync fires.
    pub schedule: DailySchedule,
    /// Timeout for one backend call.
    pub remote_timeout: Duration,
    /// Exact `Origin` values allowed to call the API from a browser.
    pub allowed_origins: Vec<String>,
    /// Skip desktop detection and run headless.
    pub force_headless: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Optional TOML settings file.
//!
//! ```toml
//! bind = "127.0.0.1:9000"
//! backend_url = "https://api.example.com"
//! config_file = "/var/lib/printer-agent/printer-config.json"
//! sync_time = "07:00"
//! sync_timezone = "America/New_York"
//! remote_timeout_secs = 10
//! allowed_origins = ["http://localhost:4200"]
//! headless = true
//! log_level = "info"
//! ```
//!
//! Every key is optional.  Keys absent here fall through to built-in defaults;
//! flags and environment variables override anything set here.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::domain::AgentSettings;

/// Error type for settings-file operations.
#[derive(Debug, Error)]
pub enum SettingsFileError {
    #[error("I/O error reading settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings TOML at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads settings from `path`, returning empty settings if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`SettingsFileError::Io`] for file-system errors other than "not
/// found", and [`SettingsFileError::Parse`] for malformed TOML or unknown keys.
pub fn load_settings(path: &Path) -> Result<AgentSettings, SettingsFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_settings(&content).map_err(|source| SettingsFileError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("settings file {} not found; using defaults", path.display());
            Ok(AgentSettings::default())
        }
        Err(source) => Err(SettingsFileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_settings(content: &str) -> Result<AgentSettings, toml::de::Error> {
    toml::from_str(content)
}

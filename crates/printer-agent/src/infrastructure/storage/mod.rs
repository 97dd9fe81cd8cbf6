//! Storage infrastructure.
//!
//! - `config_store`: the JSON document holding the active printer, owner id,
//!   and print settings.  Written by the HTTP API and the backend sync.
//! - `settings_file`: the optional read-only TOML file with process settings.

pub mod config_store;
pub mod settings_file;

pub use config_store::ConfigStore;
pub use settings_file::{load_settings, SettingsFileError};

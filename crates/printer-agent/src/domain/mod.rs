//! Process-level domain types of the agent.
//!
//! The persisted document, schedule, and wire types live in
//! `printer_agent_core`; this module only adds the runtime configuration.

pub mod config;

pub use config::{AgentConfig, AgentSettings, ConfigError};

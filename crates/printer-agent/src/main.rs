//! Printer agent: entry point.
//!
//! Runs on the user's machine next to the browser.  The web application talks
//! to it over loopback HTTP to list printers, choose the active one, and print
//! PDFs.  Once a day the agent asks the central backend which printer the
//! configured owner should be using and adopts it if it differs.
//!
//! # Usage
//!
//! ```text
//! printer-agent --backend-url <URL> [OPTIONS]
//!
//! Options:
//!   --bind <ADDR>               HTTP listen address [default: 127.0.0.1:9000]
//!   --backend-url <URL>         Central backend base URL (required)
//!   --config-file <PATH>        Persisted config document [default: printer-config.json]
//!   --sync-time <TIME>          Daily sync time, HH:MM or cron [default: 07:00]
//!   --sync-timezone <ZONE>      IANA zone for the sync time [default: America/New_York]
//!   --remote-timeout-secs <N>   Backend call timeout [default: 10]
//!   --allowed-origin <ORIGIN>   Browser origin allowed to call the API (repeatable)
//!   --settings <PATH>           Optional TOML settings file
//!   --headless                  Run without desktop integration
//!                               (aliases: --service, --daemon, --systemd)
//!   --log-level <LEVEL>         Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                         | Flag                    |
//! |----------------------------------|-------------------------|
//! | `PRINTER_AGENT_BIND`             | `--bind`                |
//! | `PRINTER_AGENT_BACKEND_URL`      | `--backend-url`         |
//! | `PRINTER_AGENT_CONFIG_FILE`      | `--config-file`         |
//! | `PRINTER_AGENT_SYNC_TIME`        | `--sync-time`           |
//! | `PRINTER_AGENT_SYNC_TZ`          | `--sync-timezone`       |
//! | `PRINTER_AGENT_REMOTE_TIMEOUT`   | `--remote-timeout-secs` |
//! | `PRINTER_AGENT_ALLOWED_ORIGINS`  | `--allowed-origin` (comma-separated) |
//! | `PRINTER_AGENT_SETTINGS`         | `--settings`            |
//! | `PRINTER_AGENT_LOG_LEVEL`        | `--log-level`           |
//!
//! Flags win over environment variables, which win over the settings file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use printer_agent::application::{PrinterSync, SyncScheduler};
use printer_agent::domain::config::DEFAULT_LOG_LEVEL;
use printer_agent::domain::{AgentConfig, AgentSettings};
use printer_agent::infrastructure::backend_client::BackendClient;
use printer_agent::infrastructure::http_api::{self, AllowedOrigins, ApiState};
use printer_agent::infrastructure::print_backend::{NativePrintBackend, PrintBackend};
use printer_agent::infrastructure::storage::{load_settings, ConfigStore};
use printer_agent::infrastructure::system_integration::select_integration;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Local printer agent for the web application.
///
/// Every option is optional on the command line; anything left unset falls
/// back to its environment variable, then the settings file, then the default.
#[derive(Debug, Default, Parser)]
#[command(
    name = "printer-agent",
    about = "Local printer agent: printer selection and PDF printing over HTTP",
    version
)]
struct Cli {
    /// Address for the HTTP API, `IP:PORT`.
    #[arg(long, env = "PRINTER_AGENT_BIND")]
    bind: Option<String>,

    /// Base URL of the central backend.
    #[arg(long, env = "PRINTER_AGENT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Path of the persisted config document.
    #[arg(long, env = "PRINTER_AGENT_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Daily sync time: `HH:MM`, or a cron expression with fixed fields.
    #[arg(long, env = "PRINTER_AGENT_SYNC_TIME")]
    sync_time: Option<String>,

    /// IANA time zone the sync time is interpreted in.
    #[arg(long, env = "PRINTER_AGENT_SYNC_TZ")]
    sync_timezone: Option<String>,

    /// Timeout for one backend call, in seconds.
    #[arg(long, env = "PRINTER_AGENT_REMOTE_TIMEOUT")]
    remote_timeout_secs: Option<u64>,

    /// Browser origin allowed to call the API.  Repeat for several.
    #[arg(
        long = "allowed-origin",
        env = "PRINTER_AGENT_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    allowed_origins: Vec<String>,

    /// Optional TOML settings file.
    #[arg(long, env = "PRINTER_AGENT_SETTINGS")]
    settings: Option<PathBuf>,

    /// Run as a background service without desktop integration.
    #[arg(long, visible_aliases = ["service", "daemon", "systemd"])]
    headless: bool,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[arg(long, env = "PRINTER_AGENT_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// The settings given on the command line or through the environment.
    fn to_settings(&self) -> AgentSettings {
        AgentSettings {
            bind: self.bind.clone(),
            backend_url: self.backend_url.clone(),
            config_file: self.config_file.clone(),
            sync_time: self.sync_time.clone(),
            sync_timezone: self.sync_timezone.clone(),
            remote_timeout_secs: self.remote_timeout_secs,
            allowed_origins: (!self.allowed_origins.is_empty())
                .then(|| self.allowed_origins.clone()),
            headless: self.headless.then_some(true),
            log_level: self.log_level.clone(),
        }
    }

    /// Merges the command line over the settings file and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged settings are invalid.
    fn into_agent_config(self, file: AgentSettings) -> anyhow::Result<AgentConfig> {
        self.to_settings()
            .or(file)
            .resolve()
            .context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_settings = match cli.settings.as_deref() {
        Some(path) => load_settings(path),
        None => Ok(AgentSettings::default()),
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // RUST_LOG wins; otherwise --log-level, then the settings file, then info.
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| {
            file_settings
                .as_ref()
                .ok()
                .and_then(|s| s.log_level.clone())
        })
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    let file_settings = file_settings.context("failed to load settings file")?;
    let config = cli.into_agent_config(file_settings)?;

    run(config).await
}

/// Wires every component together and runs until Ctrl+C.
async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let integration = select_integration(config.force_headless);
    info!(
        "printer agent starting: mode={:?}, config={}, backend={}",
        integration.run_mode(),
        config.config_file.display(),
        config.backend_base_url
    );

    let store = Arc::new(ConfigStore::new(&config.config_file));
    let backend = BackendClient::new(&config.backend_base_url, config.remote_timeout)
        .context("failed to create backend client")?;
    let scheduler = Arc::new(SyncScheduler::new(
        PrinterSync::new(store.clone(), Arc::new(backend)),
        config.schedule,
    ));
    let print_backend: Arc<dyn PrintBackend> = Arc::new(NativePrintBackend::default());

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.bind_addr))?;
    let local_addr = listener
        .local_addr()
        .context("listener has no local address")?;
    integration.on_started(local_addr);

    let scheduler_task = Arc::clone(&scheduler).spawn(Arc::clone(&running));

    let app = http_api::router(
        ApiState::new(store, print_backend),
        AllowedOrigins::new(config.allowed_origins),
    );
    let served = http_api::serve(listener, app, Arc::clone(&running)).await;

    running.store(false, Ordering::Relaxed);
    if let Err(e) = scheduler_task.await {
        warn!("sync scheduler task ended abnormally: {e}");
    }
    integration.on_shutdown();

    served
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("printer-agent").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_backend_url_is_read() {
        let cli = parse(&["--backend-url", "https://api.example.com"]);
        assert_eq!(cli.backend_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn test_cli_allowed_origin_is_repeatable() {
        let cli = parse(&[
            "--allowed-origin",
            "https://a.example",
            "--allowed-origin",
            "https://b.example",
        ]);
        assert_eq!(cli.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_cli_service_aliases_force_headless() {
        for flag in ["--headless", "--service", "--daemon", "--systemd"] {
            let cli = parse(&[flag]);
            assert!(cli.headless, "{flag} should set headless");
        }
    }

    #[test]
    fn test_unset_flags_leave_settings_unset() {
        let settings = Cli::default().to_settings();

        assert_eq!(settings, AgentSettings::default());
    }

    #[test]
    fn test_into_agent_config_defaults() {
        // Arrange
        let cli = Cli {
            backend_url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };

        // Act
        let config = cli.into_agent_config(AgentSettings::default()).unwrap();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.remote_timeout, Duration::from_secs(10));
        assert!(!config.force_headless);
    }

    #[test]
    fn test_into_agent_config_flag_beats_file() {
        let cli = Cli {
            bind: Some("127.0.0.1:9100".to_string()),
            headless: true,
            ..Default::default()
        };
        let file = AgentSettings {
            bind: Some("127.0.0.1:9200".to_string()),
            backend_url: Some("https://file.example".to_string()),
            ..Default::default()
        };

        let config = cli.into_agent_config(file).unwrap();

        assert_eq!(config.bind_addr.port(), 9100);
        assert_eq!(config.backend_base_url, "https://file.example");
        assert!(config.force_headless);
    }

    #[test]
    fn test_into_agent_config_without_backend_fails() {
        let result = Cli::default().into_agent_config(AgentSettings::default());

        assert!(result.is_err());
    }

    #[test]
    fn test_into_agent_config_invalid_bind_fails() {
        let cli = Cli {
            bind: Some("not-an-address".to_string()),
            backend_url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };

        assert!(cli.into_agent_config(AgentSettings::default()).is_err());
    }
}

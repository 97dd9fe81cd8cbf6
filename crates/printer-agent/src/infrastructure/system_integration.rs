//! Process lifecycle hooks for headless and desktop sessions.
//!
//! The agent runs either as a background service (no display) or inside a
//! user's desktop session.  The HTTP API and the sync scheduler behave the
//! same in both; only start-up and shutdown reporting differ.
//!
//! # Detection
//!
//! `--headless` (or `--service`, `--daemon`, `--systemd`) always wins.
//! Otherwise:
//!
//! - **Linux**: headless only when neither a display server (`DISPLAY` or
//!   `WAYLAND_DISPLAY`) nor a desktop session (`XDG_CURRENT_DESKTOP`,
//!   `DESKTOP_SESSION`, `GNOME_DESKTOP_SESSION_ID`, or `KDE_SESSION_VERSION`)
//!   is announced; either one is enough for desktop.
//! - **Windows**: desktop.
//! - **macOS**: headless; the agent runs as a launchd background service.
//! - **Anything else**: headless.

use std::net::SocketAddr;

use tracing::info;

/// Environment variables naming a display server connection.
const DISPLAY_VARS: [&str; 2] = ["DISPLAY", "WAYLAND_DISPLAY"];

/// Environment variables set by desktop session managers.
const DESKTOP_SESSION_VARS: [&str; 4] = [
    "XDG_CURRENT_DESKTOP",
    "DESKTOP_SESSION",
    "GNOME_DESKTOP_SESSION_ID",
    "KDE_SESSION_VERSION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Headless,
    Desktop,
}

/// Host-environment hooks invoked by `main` around the server's lifetime.
pub trait SystemIntegration: Send + Sync {
    fn run_mode(&self) -> RunMode;

    /// Called once the HTTP API is listening on `addr`.
    fn on_started(&self, addr: SocketAddr);

    /// Called after the server and scheduler have stopped.
    fn on_shutdown(&self);
}

/// Integration for services and SSH sessions: log-only.
#[derive(Debug, Default)]
pub struct HeadlessIntegration;

impl SystemIntegration for HeadlessIntegration {
    fn run_mode(&self) -> RunMode {
        RunMode::Headless
    }

    fn on_started(&self, addr: SocketAddr) {
        info!("printer agent running headless on http://{addr}");
    }

    fn on_shutdown(&self) {
        info!("printer agent stopped");
    }
}

/// Integration for interactive desktop sessions.
#[derive(Debug)]
pub struct DesktopIntegration {
    platform: &'static str,
}

impl DesktopIntegration {
    pub fn new() -> Self {
        Self {
            platform: std::env::consts::OS,
        }
    }
}

impl Default for DesktopIntegration {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemIntegration for DesktopIntegration {
    fn run_mode(&self) -> RunMode {
        RunMode::Desktop
    }

    fn on_started(&self, addr: SocketAddr) {
        info!(
            "printer agent running in {} desktop session; web interface at http://{addr}",
            self.platform
        );
    }

    fn on_shutdown(&self) {
        info!("printer agent stopped; desktop session integration released");
    }
}

/// Decides the run mode from the `--headless` flag and the environment.
///
/// `env` looks up one variable; empty values count as unset.
pub fn detect_run_mode<F>(force_headless: bool, env: F) -> RunMode
where
    F: Fn(&str) -> Option<String>,
{
    if force_headless {
        return RunMode::Headless;
    }

    if cfg!(target_os = "windows") {
        return RunMode::Desktop;
    }
    if !cfg!(target_os = "linux") {
        return RunMode::Headless;
    }

    let is_set = |name: &&str| env(name).is_some_and(|v| !v.trim().is_empty());
    let has_display = DISPLAY_VARS.iter().any(is_set);
    let has_session = DESKTOP_SESSION_VARS.iter().any(is_set);

    if !has_display && !has_session {
        RunMode::Headless
    } else {
        RunMode::Desktop
    }
}

/// Picks the integration for this process from the real environment.
pub fn select_integration(force_headless: bool) -> Box<dyn SystemIntegration> {
    match detect_run_mode(force_headless, |name| std::env::var(name).ok()) {
        RunMode::Headless => Box::new(HeadlessIntegration),
        RunMode::Desktop => Box::new(DesktopIntegration::new()),
    }
}

//! Local HTTP API used by the web application.
//!
//! | Method | Path                      | Purpose                              |
//! |--------|---------------------------|--------------------------------------|
//! | GET    | `/i-am-here`              | presence check                       |
//! | GET    | `/printers`               | installed printer names              |
//! | GET    | `/printers-details`       | name, location, URI, attributes      |
//! | POST   | `/printers/active`        | select printer and owner             |
//! | POST   | `/print`                  | print a base64 PDF on active printer |
//! | GET    | `/config`                 | whole persisted document             |
//! | POST   | `/config/print-settings`  | upsert print settings                |
//! | POST   | `/config/reset`           | delete the persisted document        |
//!
//! Browser access is limited to the configured origins (see [`cors`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::infrastructure::print_backend::PrintBackend;
use crate::infrastructure::storage::ConfigStore;

pub mod cors;
pub mod handlers;
pub mod responses;

pub use cors::AllowedOrigins;
pub use responses::{ApiError, ApiResponse};

/// Largest accepted request body.  Print payloads are base64 PDFs.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// How often the shutdown watcher polls the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub config_store: Arc<ConfigStore>,
    pub print_backend: Arc<dyn PrintBackend>,
}

impl ApiState {
    pub fn new(config_store: Arc<ConfigStore>, print_backend: Arc<dyn PrintBackend>) -> Self {
        Self {
            config_store,
            print_backend,
        }
    }
}

/// Builds the router with every route, the body limit, and the CORS layer.
pub fn router(state: ApiState, origins: AllowedOrigins) -> Router {
    Router::new()
        .route("/i-am-here", get(handlers::i_am_here))
        .route("/printers", get(handlers::list_printers))
        .route("/printers-details", get(handlers::list_printer_details))
        .route("/printers/active", post(handlers::set_active_printer))
        .route("/print", post(handlers::print))
        .route("/config", get(handlers::get_config))
        .route("/config/print-settings", post(handlers::update_print_settings))
        .route("/config/reset", post(handlers::reset_config))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            Arc::new(origins),
            cors::cors_layer,
        ))
        .with_state(state)
}

/// Serves `app` on `listener` until `running` is cleared.
///
/// In-flight requests are allowed to finish before this returns.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(listener: TcpListener, app: Router, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let addr = listener
        .local_addr()
        .context("listener has no local address")?;
    info!("HTTP API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(running))
        .await
        .context("HTTP server failed")?;

    info!("HTTP API stopped");
    Ok(())
}

async fn wait_for_shutdown(running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}

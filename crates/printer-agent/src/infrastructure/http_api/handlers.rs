//! Route handlers.
//!
//! Handlers translate HTTP into calls on the [`ConfigStore`] and the
//! [`PrintBackend`].  Both are blocking (file I/O, spooler calls), so every
//! call runs on Tokio's blocking pool.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use printer_agent_core::{ConfigDocument, PrintJob, PrinterDetails, SettingValue};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::responses::{now_millis, ApiError, ApiResponse};
use super::ApiState;
use crate::infrastructure::print_backend::PrintError;

/// `data:` URL prefix some browsers produce when reading a file as base64.
const DATA_URL_MARKER: &str = ";base64,";

// ── Request bodies ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetActivePrinterRequest {
    pub printer_name: Option<String>,
    #[serde(alias = "productionPartnerUserId")]
    pub owner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintRequest {
    pub file_name: Option<String>,
    /// Base64-encoded PDF.
    pub pdf_data: Option<String>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /i-am-here`: lets the web application detect a running agent.
pub async fn i_am_here() -> ApiResponse {
    ApiResponse::ok("The agent already exist")
}

/// `GET /printers`
pub async fn list_printers(State(state): State<ApiState>) -> Result<Json<Vec<String>>, ApiError> {
    let backend = Arc::clone(&state.print_backend);
    let names = run_blocking(move || backend.list_printers())
        .await?
        .map_err(|e| {
            warn!("listing printers failed: {e}");
            ApiError::SpoolerUnavailable(e.to_string())
        })?;

    debug!("{} printers installed", names.len());
    Ok(Json(names))
}

/// `GET /printers-details`
pub async fn list_printer_details(
    State(state): State<ApiState>,
) -> Result<Json<Vec<PrinterDetails>>, ApiError> {
    let backend = Arc::clone(&state.print_backend);
    let details = run_blocking(move || backend.list_printer_details())
        .await?
        .map_err(|e| {
            warn!("listing printer details failed: {e}");
            ApiError::SpoolerUnavailable(e.to_string())
        })?;

    Ok(Json(details))
}

/// `POST /printers/active`
pub async fn set_active_printer(
    State(state): State<ApiState>,
    Json(body): Json<SetActivePrinterRequest>,
) -> Result<ApiResponse, ApiError> {
    let name = body
        .printer_name
        .filter(|n| !n.trim().is_empty())
        .ok_or(ApiError::PrinterNameRequired)?;
    let owner_id = body.owner_id.filter(|o| !o.is_empty());

    let store = Arc::clone(&state.config_store);
    let stored = name.clone();
    run_blocking(move || store.set_active_printer(&stored, owner_id.as_deref())).await?;

    Ok(
        ApiResponse::ok(format!("Active printer successfully set to: {name}"))
            .with_field("activePrinter", &name),
    )
}

/// `POST /print`: decodes the PDF and submits it to the active printer.
pub async fn print(
    State(state): State<ApiState>,
    Json(body): Json<PrintRequest>,
) -> Result<ApiResponse, ApiError> {
    let encoded = body
        .pdf_data
        .filter(|d| !d.trim().is_empty())
        .ok_or(ApiError::PdfDataRequired)?;

    let store = Arc::clone(&state.config_store);
    let printer = run_blocking(move || store.get_active_printer())
        .await?
        .ok_or(ApiError::NoActivePrinter)?;

    let document = decode_pdf(&encoded)?;
    let job = PrintJob::new(printer, body.file_name, document);
    info!(
        "printing '{}' ({} bytes) on '{}'",
        job.title,
        job.size(),
        job.printer
    );

    let backend = Arc::clone(&state.print_backend);
    let job = run_blocking(move || backend.submit(&job).map(|()| job))
        .await?
        .map_err(|e| {
            warn!("print failed: {e}");
            match e {
                PrintError::PrinterNotFound(name) => ApiError::PrinterNotFound(name),
                other => ApiError::PrintFailed(other.to_string()),
            }
        })?;

    Ok(ApiResponse::ok("Print job completed successfully")
        .with_statuscode(200)
        .with_data(json!({
            "printerName": job.printer,
            "fileName": job.title,
            "timestamp": now_millis(),
            "documentSize": job.size(),
        })))
}

/// `GET /config`: the whole persisted document.
pub async fn get_config(State(state): State<ApiState>) -> Result<Json<ConfigDocument>, ApiError> {
    let store = Arc::clone(&state.config_store);
    Ok(Json(run_blocking(move || store.get_all_config()).await?))
}

/// `POST /config/print-settings`: upserts each key of the body.
pub async fn update_print_settings(
    State(state): State<ApiState>,
    Json(settings): Json<Map<String, Value>>,
) -> Result<ApiResponse, ApiError> {
    let store = Arc::clone(&state.config_store);
    let to_store = settings.clone();
    run_blocking(move || {
        for (key, value) in &to_store {
            store.set_print_setting(key, SettingValue::from_json(value));
        }
    })
    .await?;

    Ok(ApiResponse::ok("Print settings updated successfully")
        .with_statuscode(201)
        .with_field("updatedSettings", settings))
}

/// `POST /config/reset`
pub async fn reset_config(State(state): State<ApiState>) -> Result<ApiResponse, ApiError> {
    let store = Arc::clone(&state.config_store);
    run_blocking(move || store.reset_config()).await?;

    Ok(ApiResponse::ok("Configuration reset successfully").with_statuscode(200))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))
}

/// Decodes standard base64, tolerating line breaks and a `data:` URL prefix.
fn decode_pdf(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.find(DATA_URL_MARKER) {
        Some(idx) if encoded.starts_with("data:") => &encoded[idx + DATA_URL_MARKER.len()..],
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    STANDARD
        .decode(compact)
        .map_err(|e| ApiError::InvalidPdfData(e.to_string()))
}

//! JSON response envelope shared by every route.
//!
//! ```json
//! {
//!   "status": true,
//!   "statuscode": 200,
//!   "message": "Print job completed successfully",
//!   "data": { "printerName": "Office", "documentSize": 5120 },
//!   "timestamp": 1718000000000
//! }
//! ```
//!
//! Failures set `status` to `false` and carry a stable `errorCode` the web
//! application switches on.  The HTTP status line and `statuscode` agree.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(skip)]
    http_status: StatusCode,
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuscode: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    /// Route-specific top-level fields (`activePrinter`, `updatedSettings`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub timestamp: i64,
}

impl ApiResponse {
    /// A `200 OK` success envelope.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            http_status: StatusCode::OK,
            status: true,
            statuscode: None,
            message: message.into(),
            data: None,
            error_code: None,
            extra: Map::new(),
            timestamp: now_millis(),
        }
    }

    /// Sets the `statuscode` body field without changing the HTTP status.
    pub fn with_statuscode(mut self, code: u16) -> Self {
        self.statuscode = Some(code);
        self
    }

    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = Some(serde_json::to_value(data).unwrap_or_default());
        self
    }

    /// Adds a top-level field next to the standard ones.
    pub fn with_field(mut self, key: &str, value: impl Serialize) -> Self {
        self.extra
            .insert(key.to_string(), serde_json::to_value(value).unwrap_or_default());
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}

/// Failures a route reports to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Printer name cannot be empty")]
    PrinterNameRequired,

    #[error("PDF data cannot be null or empty")]
    PdfDataRequired,

    #[error("No active printer configured. Please select a printer first.")]
    NoActivePrinter,

    #[error("Invalid PDF data format: {0}")]
    InvalidPdfData(String),

    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    #[error("Print operation failed: {0}")]
    PrintFailed(String),

    #[error("Printer query failed: {0}")]
    SpoolerUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::PrinterNameRequired
            | Self::PdfDataRequired
            | Self::NoActivePrinter
            | Self::InvalidPdfData(_) => StatusCode::BAD_REQUEST,
            Self::PrinterNotFound(_) => StatusCode::NOT_FOUND,
            Self::PrintFailed(_) | Self::SpoolerUnavailable(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrinterNameRequired => "PRINTER_NAME_REQUIRED",
            Self::PdfDataRequired => "PDF_DATA_REQUIRED",
            Self::NoActivePrinter => "NO_ACTIVE_PRINTER",
            Self::InvalidPdfData(_) => "INVALID_PDF_DATA",
            Self::PrinterNotFound(_) => "PRINTER_NOT_FOUND",
            Self::PrintFailed(_) => "PRINT_ERROR",
            Self::SpoolerUnavailable(_) => "SPOOLER_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Print-route failures also repeat the code in `data`, where earlier
    /// clients of `/print` look for it.
    fn code_in_data(&self) -> bool {
        matches!(
            self,
            Self::PdfDataRequired
                | Self::NoActivePrinter
                | Self::InvalidPdfData(_)
                | Self::PrinterNotFound(_)
                | Self::PrintFailed(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let http_status = self.http_status();
        let code = self.code();

        ApiResponse {
            http_status,
            status: false,
            statuscode: Some(http_status.as_u16()),
            message: self.to_string(),
            data: self.code_in_data().then(|| Value::from(code)),
            error_code: Some(code),
            extra: Map::new(),
            timestamp: now_millis(),
        }
        .into_response()
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Print spooler infrastructure.
//!
//! [`PrintBackend`] is the seam between the HTTP API and the operating
//! system's spooler.  Each platform provides one implementation:
//!
//! - **Linux / macOS**: `cups` drives the CUPS command-line tools
//!   (`lpstat`, `lp`).
//! - **Windows**: `windows` calls the Win32 spooler API and submits the
//!   document as a RAW job.
//! - **Tests and other platforms**: `mock` keeps printers and jobs in memory.
//!
//! [`NativePrintBackend`] names the implementation for the build target.
//!
//! All methods block; async callers run them on the blocking thread pool.

use printer_agent_core::{PrintJob, PrinterDetails};
use thiserror::Error;

pub mod mock;

#[cfg(unix)]
pub mod cups;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(unix)]
pub use cups::CupsPrintBackend as NativePrintBackend;

#[cfg(target_os = "windows")]
pub use self::windows::WindowsPrintBackend as NativePrintBackend;

#[cfg(not(any(unix, target_os = "windows")))]
pub use mock::MockPrintBackend as NativePrintBackend;

pub use mock::MockPrintBackend;

/// Error type for spooler operations.
#[derive(Debug, Error)]
pub enum PrintError {
    /// No installed printer matches the requested name.
    #[error("printer not found: {0}")]
    PrinterNotFound(String),

    /// The spooler could not be queried or refused the job.
    #[error("print spooler error: {0}")]
    Spooler(String),

    /// The platform has no spooler integration.
    #[error("printing is not supported on this platform")]
    UnsupportedPlatform,

    #[error("I/O error talking to the spooler: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform-agnostic access to installed printers.
pub trait PrintBackend: Send + Sync {
    /// Names of all installed printers.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError`] if the spooler cannot be queried.
    fn list_printers(&self) -> Result<Vec<String>, PrintError>;

    /// Name, location, URI, and attribute summary of every installed printer.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError`] if the spooler cannot be queried.
    fn list_printer_details(&self) -> Result<Vec<PrinterDetails>, PrintError>;

    /// Sends `job.document` to `job.printer` as one spooler job.
    ///
    /// The printer name is matched case-insensitively against installed
    /// printers.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::PrinterNotFound`] when no installed printer
    /// matches, and [`PrintError::Spooler`] when the job is rejected.
    fn submit(&self, job: &PrintJob) -> Result<(), PrintError>;
}

/// Finds the installed printer matching `requested`, ignoring ASCII and
/// Unicode case, and returns its canonical name.
///
/// An exact match wins over a case-insensitive one.
///
/// # Errors
///
/// Returns [`PrintError::PrinterNotFound`] when nothing matches.
pub fn resolve_printer_name(installed: &[String], requested: &str) -> Result<String, PrintError> {
    if let Some(exact) = installed.iter().find(|name| name.as_str() == requested) {
        return Ok(exact.clone());
    }

    let wanted = requested.to_lowercase();
    installed
        .iter()
        .find(|name| name.to_lowercase() == wanted)
        .cloned()
        .ok_or_else(|| PrintError::PrinterNotFound(requested.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed() -> Vec<String> {
        vec!["Office_Laser".to_string(), "Label-Zebra".to_string()]
    }

    #[test]
    fn test_resolve_exact_name() {
        assert_eq!(
            resolve_printer_name(&installed(), "Office_Laser").unwrap(),
            "Office_Laser"
        );
    }

    #[test]
    fn test_resolve_ignores_case_and_returns_canonical_name() {
        assert_eq!(
            resolve_printer_name(&installed(), "label-zebra").unwrap(),
            "Label-Zebra"
        );
    }

    #[test]
    fn test_resolve_prefers_exact_match() {
        let installed = vec!["hp".to_string(), "HP".to_string()];

        assert_eq!(resolve_printer_name(&installed, "HP").unwrap(), "HP");
    }

    #[test]
    fn test_resolve_unknown_printer_fails() {
        let err = resolve_printer_name(&installed(), "Nope").unwrap_err();

        assert!(matches!(err, PrintError::PrinterNotFound(name) if name == "Nope"));
    }
}

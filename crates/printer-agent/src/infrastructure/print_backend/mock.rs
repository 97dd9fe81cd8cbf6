//! In-memory print backend for tests and platforms without a spooler.
//!
//! Printers are fixed at construction.  Submitted jobs are recorded so tests
//! can assert on exactly what would have reached the spooler.

use std::sync::{Mutex, PoisonError};

use printer_agent_core::{PrintJob, PrinterDetails};

use super::{resolve_printer_name, PrintBackend, PrintError};

/// A [`PrintBackend`] that never touches the operating system.
#[derive(Debug, Default)]
pub struct MockPrintBackend {
    printers: Vec<PrinterDetails>,
    jobs: Mutex<Vec<PrintJob>>,
    failure: Mutex<Option<String>>,
}

impl MockPrintBackend {
    /// A backend with the named printers and no further details.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_details(
            names
                .into_iter()
                .map(|name| PrinterDetails::new(name, None, None, &[]))
                .collect(),
        )
    }

    pub fn with_details(printers: Vec<PrinterDetails>) -> Self {
        Self {
            printers,
            ..Default::default()
        }
    }

    /// Makes every later [`PrintBackend::submit`] fail with a spooler error.
    pub fn fail_submissions(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Jobs accepted so far, oldest first.
    pub fn submitted_jobs(&self) -> Vec<PrintJob> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn names(&self) -> Vec<String> {
        self.printers.iter().map(|p| p.name.clone()).collect()
    }
}

impl PrintBackend for MockPrintBackend {
    fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        Ok(self.names())
    }

    fn list_printer_details(&self) -> Result<Vec<PrinterDetails>, PrintError> {
        Ok(self.printers.clone())
    }

    fn submit(&self, job: &PrintJob) -> Result<(), PrintError> {
        let printer = resolve_printer_name(&self.names(), &job.printer)?;

        if let Some(reason) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(PrintError::Spooler(reason));
        }

        let mut accepted = job.clone();
        accepted.printer = printer;
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(accepted);
        Ok(())
    }
}

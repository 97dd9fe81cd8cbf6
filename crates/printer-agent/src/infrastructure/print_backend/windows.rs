//! Windows print backend using the Win32 spooler API.
//!
//! Printers are enumerated with `EnumPrintersW` (level 2, local and network
//! connections).  Documents are written unmodified as a `RAW` job with
//! `StartDocPrinterW` / `WritePrinter`, which hands the PDF to the driver or
//! the printer's own PDF interpreter.

use std::ffi::c_void;

use printer_agent_core::{PrintJob, PrinterDetails};
use tracing::{debug, info};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Graphics::Printing::{
    ClosePrinter, EndDocPrinter, EndPagePrinter, EnumPrintersW, OpenPrinterW, StartDocPrinterW,
    StartPagePrinter, WritePrinter, DOC_INFO_1W, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL,
    PRINTER_HANDLE, PRINTER_INFO_2W,
};

use super::{resolve_printer_name, PrintBackend, PrintError};

/// [`PrintBackend`] backed by the Windows spooler.
#[derive(Debug, Default)]
pub struct WindowsPrintBackend;

impl WindowsPrintBackend {
    pub fn new() -> Self {
        Self
    }
}

/// One printer as read from `PRINTER_INFO_2W`.
struct SpoolerPrinter {
    name: String,
    location: Option<String>,
    port: Option<String>,
    attributes: Vec<(String, String)>,
}

impl PrintBackend for WindowsPrintBackend {
    fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        Ok(enum_printers()?.into_iter().map(|p| p.name).collect())
    }

    fn list_printer_details(&self) -> Result<Vec<PrinterDetails>, PrintError> {
        Ok(enum_printers()?
            .into_iter()
            .map(|p| PrinterDetails::new(p.name, p.location, p.port, &p.attributes))
            .collect())
    }

    fn submit(&self, job: &PrintJob) -> Result<(), PrintError> {
        let installed = self.list_printers()?;
        let printer = resolve_printer_name(&installed, &job.printer)?;

        debug!(
            "submitting {} bytes to '{printer}' as '{}'",
            job.size(),
            job.title
        );

        let handle = PrinterHandle::open(&printer)?;
        let job_id = handle.write_raw_document(&job.title, &job.document)?;

        info!("print job {job_id} accepted by '{printer}'");
        Ok(())
    }
}

// ── Win32 helpers ─────────────────────────────────────────────────────────────

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Reads a possibly-null wide string owned by the spooler buffer.
///
/// # Safety
///
/// `value` must be null or point at a NUL-terminated UTF-16 string.
unsafe fn read_pwstr(value: PWSTR) -> Option<String> {
    if value.is_null() {
        return None;
    }
    value
        .to_string()
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn enum_printers() -> Result<Vec<SpoolerPrinter>, PrintError> {
    let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
    let mut needed = 0u32;
    let mut returned = 0u32;

    // SAFETY: a sizing call with no buffer; the spooler only writes the two
    // counters, which are valid for the duration of the call.  The expected
    // ERROR_INSUFFICIENT_BUFFER result is ignored.
    unsafe {
        let _ = EnumPrintersW(flags, PCWSTR::null(), 2, None, &mut needed, &mut returned);
    }
    if needed == 0 {
        return Ok(Vec::new());
    }

    let byte_len = needed as usize;
    let mut buffer = aligned_buffer(byte_len);
    // SAFETY: `buffer` holds at least `byte_len` initialised bytes and
    // outlives every pointer the spooler writes into it.
    unsafe {
        let bytes = std::slice::from_raw_parts_mut(buffer.as_mut_ptr().cast::<u8>(), byte_len);
        EnumPrintersW(
            flags,
            PCWSTR::null(),
            2,
            Some(bytes),
            &mut needed,
            &mut returned,
        )
        .map_err(|e| PrintError::Spooler(format!("EnumPrintersW failed: {e}")))?;
    }

    let records = buffer.as_ptr().cast::<PRINTER_INFO_2W>();
    let mut printers = Vec::with_capacity(returned as usize);
    for i in 0..returned as usize {
        // SAFETY: the spooler filled `buffer` with `returned` consecutive
        // PRINTER_INFO_2W records whose string pointers point into `buffer`,
        // and `aligned_buffer` starts on an 8-byte boundary.
        let info = unsafe { &*records.add(i) };
        let Some(name) = (unsafe { read_pwstr(info.pPrinterName) }) else {
            continue;
        };

        let mut attributes = vec![("status".to_string(), status_text(info.Status))];
        let text_fields = [
            ("driver", info.pDriverName),
            ("port", info.pPortName),
            ("share", info.pShareName),
            ("comment", info.pComment),
        ];
        for (key, value) in text_fields {
            // SAFETY: see above; every pointer is null or points into `buffer`.
            if let Some(value) = unsafe { read_pwstr(value) } {
                attributes.push((key.to_string(), value));
            }
        }
        attributes.push(("jobs".to_string(), info.cJobs.to_string()));

        printers.push(SpoolerPrinter {
            name,
            // SAFETY: see above.
            location: unsafe { read_pwstr(info.pLocation) },
            port: unsafe { read_pwstr(info.pPortName) },
            attributes,
        });
    }

    Ok(printers)
}

/// Zeroed storage of at least `byte_len` bytes, aligned for
/// `PRINTER_INFO_2W` (pointer-sized fields).
fn aligned_buffer(byte_len: usize) -> Vec<u64> {
    vec![0u64; byte_len.div_ceil(std::mem::size_of::<u64>())]
}

fn status_text(status: u32) -> String {
    if status == 0 {
        "ready".to_string()
    } else {
        format!("0x{status:08x}")
    }
}

/// Open spooler handle, closed on drop.
struct PrinterHandle(PRINTER_HANDLE);

impl PrinterHandle {
    fn open(name: &str) -> Result<Self, PrintError> {
        let name_w = wide(name);
        let mut handle = PRINTER_HANDLE::default();

        // SAFETY: `name_w` is NUL-terminated and outlives the call; `handle`
        // is a valid out-pointer.
        unsafe { OpenPrinterW(PCWSTR(name_w.as_ptr()), &mut handle, None) }
            .map_err(|e| PrintError::Spooler(format!("OpenPrinterW('{name}') failed: {e}")))?;

        Ok(Self(handle))
    }

    /// Writes `document` as one RAW job and returns the spooler job id.
    fn write_raw_document(&self, title: &str, document: &[u8]) -> Result<u32, PrintError> {
        let mut title_w = wide(title);
        let mut datatype_w = wide("RAW");
        let doc_info = DOC_INFO_1W {
            pDocName: PWSTR(title_w.as_mut_ptr()),
            pOutputFile: PWSTR::null(),
            pDatatype: PWSTR(datatype_w.as_mut_ptr()),
        };

        // SAFETY: `doc_info` and the buffers it points at outlive the call.
        let job_id = unsafe { StartDocPrinterW(self.0, 1, &doc_info) };
        if job_id == 0 {
            return Err(last_error("StartDocPrinterW"));
        }

        let result = self.write_page(document);

        // SAFETY: a document was started on this handle above.
        let ended = unsafe { EndDocPrinter(self.0) }.as_bool();
        result?;
        if !ended {
            return Err(last_error("EndDocPrinter"));
        }
        Ok(job_id)
    }

    fn write_page(&self, document: &[u8]) -> Result<(), PrintError> {
        let length = u32::try_from(document.len())
            .map_err(|_| PrintError::Spooler("document larger than 4 GiB".to_string()))?;

        // SAFETY: a document is open on this handle.
        if !unsafe { StartPagePrinter(self.0) }.as_bool() {
            return Err(last_error("StartPagePrinter"));
        }

        let mut written = 0u32;
        // SAFETY: `document` is valid for `length` bytes for the whole call.
        let ok = unsafe {
            WritePrinter(
                self.0,
                document.as_ptr() as *const c_void,
                length,
                &mut written,
            )
        }
        .as_bool();

        // SAFETY: a page was started above.
        unsafe {
            let _ = EndPagePrinter(self.0);
        }

        if !ok {
            return Err(last_error("WritePrinter"));
        }
        if written != length {
            return Err(PrintError::Spooler(format!(
                "WritePrinter wrote {written} of {length} bytes"
            )));
        }
        Ok(())
    }
}

impl Drop for PrinterHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful OpenPrinterW.
        unsafe {
            let _ = ClosePrinter(self.0);
        }
    }
}

fn last_error(call: &str) -> PrintError {
    PrintError::Spooler(format!("{call} failed: {}", windows::core::Error::from_win32()))
}

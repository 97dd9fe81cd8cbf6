//! CUPS print backend for Linux and macOS.
//!
//! Uses the command-line tools every CUPS installation ships:
//!
//! | Operation           | Command                          |
//! |---------------------|----------------------------------|
//! | printer names       | `lpstat -e`                      |
//! | printer details     | `lpstat -l -p` and `lpstat -v`   |
//! | submit a document   | `lp -d NAME -t TITLE -` (stdin)  |
//!
//! Commands run with `LC_ALL=C` so their output is parseable regardless of the
//! user's locale.  The parsers are plain functions over the captured text and
//! are unit tested against recorded output.

use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use printer_agent_core::{PrintJob, PrinterDetails};
use tracing::{debug, info};

use super::{resolve_printer_name, PrintBackend, PrintError};

/// `lpstat` prints this (and exits non-zero) when no printer is installed.
const NO_DESTINATIONS: &str = "No destinations added";

/// [`PrintBackend`] that shells out to `lpstat` and `lp`.
#[derive(Debug, Clone)]
pub struct CupsPrintBackend {
    lpstat: String,
    lp: String,
}

impl CupsPrintBackend {
    pub fn new() -> Self {
        Self::with_commands("lpstat", "lp")
    }

    /// Uses the given executables instead of `lpstat` and `lp` from `PATH`.
    pub fn with_commands(lpstat: impl Into<String>, lp: impl Into<String>) -> Self {
        Self {
            lpstat: lpstat.into(),
            lp: lp.into(),
        }
    }

    fn lpstat(&self, args: &[&str]) -> Result<String, PrintError> {
        let output = Command::new(&self.lpstat)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| PrintError::Spooler(format!("cannot run {}: {e}", self.lpstat)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains(NO_DESTINATIONS) {
            return Ok(String::new());
        }
        Err(command_failure(&self.lpstat, &output))
    }
}

impl Default for CupsPrintBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintBackend for CupsPrintBackend {
    fn list_printers(&self) -> Result<Vec<String>, PrintError> {
        Ok(parse_destinations(&self.lpstat(&["-e"])?))
    }

    fn list_printer_details(&self) -> Result<Vec<PrinterDetails>, PrintError> {
        let long = self.lpstat(&["-l", "-p"])?;
        let devices = parse_device_uris(&self.lpstat(&["-v"])?);

        Ok(parse_long_listing(&long)
            .into_iter()
            .map(|block| {
                let uri = devices.get(&block.name).cloned();
                PrinterDetails::new(block.name, block.location, uri, &block.attributes)
            })
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

        let mut child = Command::new(&self.lp)
            .args(["-d", printer.as_str(), "-t", job.title.as_str(), "-"])
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PrintError::Spooler(format!("cannot run {}: {e}", self.lp)))?;

        // stdin is closed at the end of this block so `lp` sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&job.document),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;

        if let Err(e) = written {
            return Err(write_failure(&self.lp, &e, &output));
        }
        if !output.status.success() {
            return Err(command_failure(&self.lp, &output));
        }

        info!(
            "print job accepted by '{printer}': {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

fn command_failure(program: &str, output: &Output) -> PrintError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    PrintError::Spooler(if detail.is_empty() {
        format!("{program} exited with {}", output.status)
    } else {
        format!("{program}: {detail}")
    })
}

/// `lp` stopped reading before the whole document was sent.
fn write_failure(program: &str, error: &std::io::Error, output: &Output) -> PrintError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    PrintError::Spooler(if detail.is_empty() {
        format!(
            "{program} exited with {} before reading the document: {error}",
            output.status
        )
    } else {
        format!("{program}: {detail} (document not fully sent: {error})")
    })
}

// ── Output parsers ────────────────────────────────────────────────────────────

/// One `printer …` block of `lpstat -l -p`.
#[derive(Debug, Default, PartialEq, Eq)]
struct PrinterBlock {
    name: String,
    location: Option<String>,
    attributes: Vec<(String, String)>,
}

/// `lpstat -e`: one destination name per line.
fn parse_destinations(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `lpstat -v`: `device for NAME: URI` per line.
fn parse_device_uris(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("device for "))
        .filter_map(|rest| rest.split_once(": "))
        .map(|(name, uri)| (name.to_string(), uri.trim().to_string()))
        .collect()
}

/// `lpstat -l -p`: a `printer NAME is STATE.  …` header followed by
/// tab-indented `Key: value` lines.
fn parse_long_listing(output: &str) -> Vec<PrinterBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<PrinterBlock> = None;

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("printer ") {
            if let Some(done) = current.take() {
                blocks.push(done);
            }

            let (name, rest) = header.split_once(' ').unwrap_or((header, ""));
            let mut block = PrinterBlock {
                name: name.to_string(),
                ..Default::default()
            };
            if let Some(state) = rest
                .trim()
                .strip_prefix("is ")
                .and_then(|s| s.split('.').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                block.attributes.push(("state".to_string(), state.to_string()));
            }
            current = Some(block);
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        if !line.starts_with(char::is_whitespace) {
            continue;
        }
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if key == "Location" {
            block.location = Some(value.to_string());
        }
        block.attributes.push((key.to_string(), value.to_string()));
    }

    if let Some(done) = current {
        blocks.push(done);
    }
    blocks
}

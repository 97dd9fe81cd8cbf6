//! Printer descriptions and print jobs.

use serde::{Deserialize, Serialize};

/// Location reported when the spooler has none for a printer.
pub const UNKNOWN_LOCATION: &str = "Not specified";

/// Attribute summary reported when the spooler lists no attributes.
pub const NO_ATTRIBUTES: &str = "No attributes found";

/// File name used for jobs submitted without one.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// What the spooler knows about one installed printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDetails {
    pub name: String,
    pub location: String,
    /// Device URI (`ipp://…`, `usb://…`), when the spooler exposes one.
    pub uri: Option<String>,
    /// `"key: value"` pairs joined with `", "`.
    pub all_attributes: String,
}

impl PrinterDetails {
    /// Builds details for `name` from optional spooler fields, applying the
    /// standard placeholders for anything missing.
    pub fn new(
        name: impl Into<String>,
        location: Option<String>,
        uri: Option<String>,
        attributes: &[(String, String)],
    ) -> Self {
        let all_attributes = if attributes.is_empty() {
            NO_ATTRIBUTES.to_string()
        } else {
            attributes
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            name: name.into(),
            location: location
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            uri,
            all_attributes,
        }
    }
}

/// A document handed to the spooler for one named printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub printer: String,
    /// Job title shown in the spooler queue.
    pub title: String,
    pub document: Vec<u8>,
}

impl PrintJob {
    pub fn new(printer: impl Into<String>, title: Option<String>, document: Vec<u8>) -> Self {
        Self {
            printer: printer.into(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            document,
        }
    }

    pub fn size(&self) -> usize {
        self.document.len()
    }
}

//! Response envelope of the backend's "default active printer" endpoint.
//!
//! ```text
//! GET {base}/api/public/printer/{ownerId}/default-active
//!
//! {"statuscode": 200, "status": true, "data": "HP-LaserJet"}
//! ```
//!
//! Missing fields decode to their zero values (`0`, `false`, absent) so a
//! truncated envelope is classified as "unexpected" rather than failing to
//! parse.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The `statuscode` value the backend uses for success.
pub const STATUS_OK: i64 = 200;

/// Decoded `{statuscode, status, data}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    #[serde(default)]
    pub statuscode: i64,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub data: Option<String>,
}

/// Why an envelope does not carry an authoritative printer name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("unexpected envelope: statuscode={statuscode}, status={status}")]
    Unexpected { statuscode: i64, status: bool },

    #[error("successful envelope without a printer name")]
    MissingPrinter,
}

impl RemoteEnvelope {
    /// Convenience constructor for a successful envelope.
    pub fn ok(printer: impl Into<String>) -> Self {
        Self {
            statuscode: STATUS_OK,
            status: true,
            data: Some(printer.into()),
        }
    }

    /// Extracts the printer name the backend considers authoritative.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::Unexpected`] unless `statuscode == 200` and
    ///   `status == true`.
    /// - [`EnvelopeError::MissingPrinter`] when the envelope is successful but
    ///   `data` is absent or empty.
    pub fn authoritative_printer(&self) -> Result<&str, EnvelopeError> {
        if self.statuscode != STATUS_OK || !self.status {
            return Err(EnvelopeError::Unexpected {
                statuscode: self.statuscode,
                status: self.status,
            });
        }

        match self.data.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(EnvelopeError::MissingPrinter),
        }
    }
}

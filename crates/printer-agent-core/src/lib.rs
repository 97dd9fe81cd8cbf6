//! # printer-agent-core
//!
//! Shared types for the printer agent: the persisted configuration document,
//! the daily sync schedule, and the JSON envelope returned by the central
//! backend.
//!
//! This crate performs no I/O.  Reading and writing the document, talking to
//! the backend, and driving timers all live in the `printer-agent` crate; the
//! types here only describe *what* is stored and *when* a sync is due.
//!
//! - **`domain`** – `ConfigDocument` (active printer, owner, print settings,
//!   last-updated stamp), printer descriptions, and `DailySchedule`.
//! - **`protocol`** – the `{statuscode, status, data}` envelope used by the
//!   backend's "default active printer" endpoint.

pub mod domain;
pub mod protocol;

pub use domain::document::{ConfigDocument, SettingValue};
pub use domain::printer::{PrintJob, PrinterDetails};
pub use domain::schedule::{DailySchedule, ScheduleError};
pub use protocol::envelope::{EnvelopeError, RemoteEnvelope};

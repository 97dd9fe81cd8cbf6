//! Application layer use cases.
//!
//! Use cases depend on traits, never on concrete storage or HTTP clients:
//!
//! - **`sync_printer`**: one reconciliation pass between the locally stored
//!   active printer and the backend's default printer for the stored owner.
//!   Defines the [`ActivePrinterStore`](sync_printer::ActivePrinterStore) and
//!   [`RemotePrinterSource`](sync_printer::RemotePrinterSource) seams that the
//!   infrastructure layer implements.
//! - **`scheduler`**: the daily timer that runs those passes and refuses to
//!   start one while another is in flight.

pub mod scheduler;
pub mod sync_printer;

pub use scheduler::{SchedulerState, SyncScheduler};
pub use sync_printer::{
    ActivePrinterStore, PrinterReplacement, PrinterSync, RemotePrinterSource, SyncError,
    SyncOutcome,
};

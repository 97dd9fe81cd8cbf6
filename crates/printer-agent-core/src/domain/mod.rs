//! Domain types for the printer agent.
//!
//! Nothing in here touches the file system, the network, or the clock.  Every
//! operation that needs "now" takes it as a parameter so the caller decides
//! where time comes from.

/// The persisted configuration document.
pub mod document;

/// Printer descriptions and print jobs.
pub mod printer;

/// Daily wall-clock schedule for the backend sync.
pub mod schedule;

//! Wire types exchanged with the central backend.

pub mod envelope;

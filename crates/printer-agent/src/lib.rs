//! printer-agent library crate.
//!
//! A local agent that lets a web application pick a printer on the user's
//! machine and print PDFs on it, and that once a day reconciles the selected
//! printer with the central backend.
//!
//! # Architecture
//!
//! ```text
//! Web application (JSON over HTTP, 127.0.0.1:9000)
//!         ↕
//! [printer-agent]
//!   ├── domain/             AgentConfig and its layered settings
//!   ├── application/        PrinterSync pass, SyncScheduler timer
//!   └── infrastructure/
//!         ├── http_api/       axum routes, response envelope, CORS
//!         ├── storage/        ConfigStore (JSON document), TOML settings
//!         ├── backend_client  reqwest client for the backend
//!         ├── print_backend/  CUPS, Win32 spooler, in-memory mock
//!         └── system_integration  headless / desktop lifecycle hooks
//!         ↕
//! Central backend  (GET /api/public/printer/{ownerId}/default-active)
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O.
//! - `application` depends on `domain`, `printer-agent-core`, and traits it
//!   defines itself (`ActivePrinterStore`, `RemotePrinterSource`).
//! - `infrastructure` implements those traits and may depend on every layer.

/// Domain layer: process configuration.
pub mod domain;

/// Application layer: backend sync use case and its scheduler.
pub mod application;

/// Infrastructure layer: HTTP API, storage, backend client, spoolers.
pub mod infrastructure;

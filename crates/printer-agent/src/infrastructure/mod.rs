//! Infrastructure layer.
//!
//! Contains OS- and network-facing adapters: the HTTP API, the config file,
//! the backend client, the print spoolers, and host-session integration.
//!
//! **Dependency rule**: this layer may depend on `application` and `domain`,
//! but MUST NOT be imported by them.

pub mod backend_client;
pub mod http_api;
pub mod print_backend;
pub mod storage;
pub mod system_integration;

//! HTTP client for the central backend's default-printer endpoint.
//!
//! ```text
//! GET {base}/api/public/printer/{ownerId}/default-active
//! ```
//!
//! The owner id is inserted as one percent-encoded path segment, so ids with
//! `/`, spaces, or other reserved characters cannot change the route.

use std::time::Duration;

use async_trait::async_trait;
use printer_agent_core::RemoteEnvelope;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::application::sync_printer::{RemotePrinterSource, SyncError};

/// Errors raised while constructing a [`BackendClient`].
#[derive(Debug, Error)]
pub enum BackendClientError {
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`RemotePrinterSource`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Creates a client for `base_url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendClientError::InvalidBaseUrl`] unless `base_url` is an
    /// absolute `http`/`https` URL, and [`BackendClientError::Client`] if the
    /// TLS backend cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendClientError> {
        let invalid = |reason: &str| BackendClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(base_url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path"));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Full URL of the default-printer endpoint for `owner_id`.
    pub fn default_printer_url(&self, owner_id: &str) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "api",
                "public",
                "printer",
                owner_id,
                "default-active",
            ]);
        }
        url
    }
}

#[async_trait]
impl RemotePrinterSource for BackendClient {
    async fn fetch_default_printer(&self, owner_id: &str) -> Result<RemoteEnvelope, SyncError> {
        let url = self.default_printer_url(owner_id);
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        serde_json::from_str(&body).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if err.is_connect() {
        SyncError::Unreachable(err.to_string())
    } else {
        SyncError::Transport(err.to_string())
    }
}

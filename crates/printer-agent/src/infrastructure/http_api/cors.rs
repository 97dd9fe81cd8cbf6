//! Origin allow-list middleware.
//!
//! The agent listens on loopback and is called from the web application in
//! the user's browser.  Only the configured origins may read responses:
//!
//! - A request whose `Origin` is allowed gets it echoed in
//!   `Access-Control-Allow-Origin` (plus `Vary: Origin`).
//! - An `OPTIONS` preflight from an allowed origin is answered here with
//!   `204 No Content` and never reaches a route.
//! - A preflight from any other origin gets `403 Forbidden`.
//! - Requests without `Origin` (curl, the agent's own tests) pass through
//!   untouched.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type";
/// Seconds a browser may cache a preflight answer.
const PREFLIGHT_MAX_AGE: &str = "1800";

/// Exact-match set of allowed `Origin` values.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins(HashSet<String>);

impl AllowedOrigins {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            origins
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .collect(),
        )
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.0.contains(origin)
    }
}

/// `axum::middleware::from_fn_with_state` handler enforcing the allow-list.
pub async fn cors_layer(
    State(origins): State<Arc<AllowedOrigins>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(origin) = origin else {
        return next.run(request).await;
    };
    let allowed = origins.allows(&origin);

    if request.method() == Method::OPTIONS {
        if !allowed {
            debug!("rejecting preflight from origin {origin}");
            return StatusCode::FORBIDDEN.into_response();
        }
        let requested_headers = request
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();

        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        allow_origin(headers, &origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            requested_headers.unwrap_or(HeaderValue::from_static(DEFAULT_ALLOWED_HEADERS)),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        return response;
    }

    let mut response = next.run(request).await;
    if allowed {
        allow_origin(response.headers_mut(), &origin);
    }
    response
}

fn allow_origin(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

pub mod registry;
pub mod traits;

// API provider implementations
pub mod coingecko;
pub mod exchangerate;

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

use crate::errors::{sanitize_message, CoreError};

/// Build an HTTP client with the configured request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, timeout_secs, "HTTP client build failed, falling back to one without a timeout");
            Client::new()
        })
}

/// Human-readable reason for a non-success HTTP status.
pub fn describe_status(status: StatusCode) -> String {
    let reason = match status.as_u16() {
        400 => "bad request",
        401 => "authentication failed, check the API key",
        403 => "access forbidden, check permissions or plan",
        404 => "resource not found",
        429 => "request rate limit exceeded",
        500 => "internal server error",
        503 => "service temporarily unavailable",
        _ => "unexpected status",
    };
    format!("HTTP {}: {reason}", status.as_u16())
}

/// Turn a transport error into `ProviderUnavailable`, hiding secrets.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error, secret: Option<&str>) -> CoreError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        sanitize_message(&e.to_string(), secret)
    };
    CoreError::unavailable(provider, reason)
}

/// Reject non-2xx responses with a mapped reason.
pub(crate) fn ensure_success(provider: &str, response: Response) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CoreError::unavailable(provider, describe_status(status)))
    }
}

//! Shared HTTP error mapping for provider calls

use atlas_core::AtlasError;
use reqwest::StatusCode;

/// Map a transport-level failure. Timeouts and connection errors are
/// transient by definition.
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> AtlasError {
    AtlasError::unavailable(service, err.to_string(), 30)
}

/// Map a non-success HTTP status. Rate limits and server errors are
/// transient; anything else is a data problem with the request.
pub(crate) fn status_error(service: &str, status: StatusCode, body: String) -> AtlasError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AtlasError::unavailable(service, format!("{}: {}", status, body), 30)
    } else {
        AtlasError::data(format!("{} API error ({}): {}", service, status, body))
    }
}

use thiserror::Error;

use crate::transport::TransportError;

/// Fixed user-facing message for a terminally expired session.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The session could not be refreshed; the caller has been signed out.
    #[error("Session expired. Please sign in again.")]
    SessionExpired,

    /// 401 whose body is not an expired-token error: a permissions failure,
    /// surfaced raw without touching the session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::InvalidResponse(error.to_string())
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..MAX_ERROR_BODY_LENGTH],
            body.len()
        )
    }
}

impl ApiError {
    /// Map a non-2xx response that is not part of the 401 refresh protocol.
    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = truncate_body(body);
        match status {
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::RequestFailed {
                status,
                body: truncated,
            },
        }
    }
}

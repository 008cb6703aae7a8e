//! Error types for the backend API

use thiserror::Error;

/// Errors that can occur when talking to the study backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: connection refused, timeout, TLS, ...
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("{operation} failed ({status}): {message}")]
    Status {
        /// Endpoint that failed, e.g. "ask"
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Body or reason phrase
        message: String,
    },

    /// Body was not the JSON we expected
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that is unusable, e.g. a quiz with no questions
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether trying the same action again could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::InvalidResponse(_) => true,
            ApiError::Json(_) => false,
        }
    }

    /// Whether the backend looks unreachable rather than unhappy
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ApiError::Request(e) if e.is_connect() || e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_recoverable() {
        let err = ApiError::Status { operation: "ask", status: 503, message: "busy".into() };
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "ask failed (503): busy");
    }

    #[test]
    fn client_errors_are_not() {
        let err = ApiError::Status { operation: "upload_pdf", status: 422, message: "bad".into() };
        assert!(!err.is_recoverable());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn invalid_response_message() {
        let err = ApiError::InvalidResponse("quiz has no questions".into());
        assert_eq!(err.to_string(), "Invalid response: quiz has no questions");
    }
}

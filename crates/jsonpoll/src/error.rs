//! Client-facing errors of the JSONP endpoints
//!
//! Each variant maps to a fixed status code and a fixed plain-text body.
//! Error bodies are meant for humans reading a network trace, so they are
//! never JSON.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Plain-text content type used by every non-frame response.
pub const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";

/// Result alias for request processing.
pub type JsonpResult<T> = Result<T, JsonpError>;

/// Everything a single JSONP request can be rejected with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonpError {
    /// Receive request without a `c` query parameter
    #[error("\"callback\" parameter required")]
    MissingCallback,

    /// Receive request whose callback is not a safe identifier
    #[error("invalid \"callback\" parameter")]
    InvalidCallback,

    /// Send request for an unknown or closed session
    #[error("session not found")]
    SessionNotFound,

    /// Send request without a usable payload
    #[error("Payload expected.")]
    PayloadExpected,

    /// Send request whose payload is not valid JSON
    #[error("Broken JSON encoding.")]
    BrokenJson,

    /// The application failed while processing the batch
    #[error("Message handler failed.")]
    HandlerFailed,
}

impl JsonpError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body for this error
    pub fn body(&self) -> String {
        match self {
            Self::SessionNotFound => String::new(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for JsonpError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, TEXT_PLAIN)],
            self.body(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bodies_are_fixed_strings() {
        assert_eq!(
            JsonpError::MissingCallback.body(),
            "\"callback\" parameter required"
        );
        assert_eq!(JsonpError::PayloadExpected.body(), "Payload expected.");
        assert_eq!(JsonpError::BrokenJson.body(), "Broken JSON encoding.");
        assert_eq!(JsonpError::HandlerFailed.body(), "Message handler failed.");
        assert_eq!(JsonpError::SessionNotFound.body(), "");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(JsonpError::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            JsonpError::BrokenJson.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_is_plain_text() {
        let response = JsonpError::PayloadExpected.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            TEXT_PLAIN
        );
    }
}

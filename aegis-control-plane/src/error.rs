//! # Core Error Taxonomy
//!
//! `CoreError` is the single error type the safety-and-steering subsystem
//! returns. Each variant maps to a stable HTTP status and error code so the
//! ambient HTTP surface can render it without re-deriving the mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The safety verdict disallowed the request or response.
    #[error("policy blocked: {message}")]
    PolicyBlocked { message: String },

    /// Neither the primary nor fallback route is available.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// A deadline was exceeded at the provider or a periodic task.
    #[error("timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A single detector failed; the request continued with the remaining
    /// detectors. Fatal only in strict mode.
    #[error("detector error: {message}")]
    RecoverableDetectorError { message: String },

    /// Invalid configuration, fatal at startup.
    #[error("configuration error: {message}")]
    ConfigError { message: String },

    /// Anything else.
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::PolicyBlocked { .. } => "policy_blocked",
            CoreError::ProviderUnavailable { .. } => "provider_unavailable",
            CoreError::Timeout { .. } => "timeout",
            CoreError::RecoverableDetectorError { .. } => "recoverable_detector_error",
            CoreError::ConfigError { .. } => "config_error",
            CoreError::InternalError { .. } => "internal_error",
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::PolicyBlocked { .. } => StatusCode::BAD_REQUEST,
            CoreError::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoreError::RecoverableDetectorError { .. } => StatusCode::BAD_GATEWAY,
            CoreError::ConfigError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
                "code": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_blocked_maps_to_bad_request() {
        let err = CoreError::PolicyBlocked {
            message: "pii detected".to_string(),
        };
        assert_eq!(err.kind(), "policy_blocked");
    }
}

//! API error types and responses.
//!
//! Every error is returned as `{"error": {"code": ..., "message": ...}}`.
//! Core errors keep their two-kind taxonomy on the wire.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use pvectl_control::ControlError;
use pvectl_core::CoreError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The VM's status does not allow the requested operation.
    #[error("{0}")]
    PreconditionViolation(String),

    /// The hypervisor rejected or failed the request.
    #[error("{0}")]
    RemoteFailure(String),

    /// Invalid tool arguments.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No tool with this name exists.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::PreconditionViolation(_) => StatusCode::CONFLICT,
            Self::RemoteFailure(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownTool(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PreconditionViolation(_) => "precondition_violation",
            Self::RemoteFailure(_) => "remote_operation_failure",
            Self::BadRequest(_) => "bad_request",
            Self::UnknownTool(_) => "unknown_tool",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::PreconditionViolation(reason) => Self::PreconditionViolation(reason),
            err @ ControlError::RemoteFailure { .. } => {
                tracing::error!(error = %err, "Remote operation failed");
                Self::RemoteFailure(err.to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

//! Error types for the orchestration core.
//!
//! Every failure leaving the core is one of two kinds: a precondition
//! violation detected locally from the VM's live status, or a failure of the
//! remote control plane. Nothing is retried.

use pvectl_client::RemoteError;
use serde::Serialize;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in lifecycle and inventory operations.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// The VM's current status does not permit the requested operation.
    #[error("{0}")]
    PreconditionViolation(String),

    /// The remote control plane rejected or failed the request.
    #[error("Failed to {operation}: {source}")]
    RemoteFailure {
        /// What was being attempted, e.g. `start VM 100`.
        operation: String,
        /// The remote error, message kept verbatim.
        #[source]
        source: RemoteError,
    },
}

/// Stable identifier of an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ControlError::PreconditionViolation`].
    PreconditionViolation,
    /// See [`ControlError::RemoteFailure`].
    RemoteOperationFailure,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreconditionViolation => "precondition_violation",
            Self::RemoteOperationFailure => "remote_operation_failure",
        }
    }
}

impl ControlError {
    /// Wrap a remote error with the operation it interrupted.
    #[must_use]
    pub fn remote(operation: impl Into<String>, source: RemoteError) -> Self {
        Self::RemoteFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Build a precondition violation.
    #[must_use]
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionViolation(reason.into())
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PreconditionViolation(_) => ErrorKind::PreconditionViolation,
            Self::RemoteFailure { .. } => ErrorKind::RemoteOperationFailure,
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::PreconditionViolation(_) => 409,
            Self::RemoteFailure { .. } => 502,
        }
    }
}

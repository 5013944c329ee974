//! Error types for the hypervisor client.
//!
//! `RemoteError` carries the remote plane's own message untouched; callers
//! add operation context on top of it.

use thiserror::Error;

/// A result type using `RemoteError`.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors raised by the remote control plane or the transport reaching it.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The request never produced an HTTP response (DNS, TLS, connect, timeout).
    #[error("{0}")]
    Transport(String),

    /// The hypervisor answered with a non-success status.
    #[error("{message}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Message reported by the API.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// A guest command did not finish in time.
    #[error("{0}")]
    Timeout(String),
}

impl RemoteError {
    /// Build an API error from a status code and message.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code if the API produced one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the error says the addressed resource does not exist.
    ///
    /// Proxmox reports a missing guest as a 500 whose message reads
    /// "Configuration file '...' does not exist", so the message is checked
    /// as well as the status code.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        if self.status() == Some(404) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        message.contains("not found") || message.contains("does not exist")
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors raised while loading client configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing env var: {0}")]
    MissingEnv(&'static str),

    /// An environment variable has an unusable value.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// The offending variable.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

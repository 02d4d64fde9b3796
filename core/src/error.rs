//! Error type shared by every client surface.
//!
//! # Design
//! Task calls and auth calls both fail with `ApiError`. A non-2xx response
//! always lands in `Status`, carrying the server's `detail` message (or a
//! fallback), the HTTP status code and the optional machine-readable
//! `error_code`. Everything else describes a failure on the client side of
//! the round-trip.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by the request core, the resource clients and the
/// session stores.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a status outside 200..=299.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        error_code: Option<String>,
    },

    /// Endpoint paths are relative to the base URL and must start with `/`.
    #[error("invalid endpoint {0:?}: must begin with '/'")]
    InvalidEndpoint(String),

    /// The request never produced a response (connect, DNS, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The session store could not be read or written.
    #[error("session storage failed: {0}")]
    Session(String),
}

impl ApiError {
    /// HTTP status of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable code sent by the server, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::Status { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for 401 responses; the stored token is missing, expired or
    /// rejected by the server.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

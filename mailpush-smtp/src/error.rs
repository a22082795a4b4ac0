//! Error types for the SMTP session layer.
//!
//! Connection errors are fatal to a session. Authentication and handler
//! errors never are: they are turned into SMTP replies by the session.

use std::io;

use mailpush_common::error::SessionError;
use thiserror::Error;

/// Errors that can occur during connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O error during connection operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ConnectionError> for SessionError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Io(err) => Self::Connection(err),
        }
    }
}

/// Why a `PLAIN` authentication exchange failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The client sent `*` instead of a response.
    #[error("Authentication cancelled")]
    Cancelled,

    #[error("Invalid base64 in authentication response: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// The decoded response is not `authzid NUL authcid NUL passwd`.
    #[error("Malformed PLAIN response")]
    Malformed,

    /// Well formed, but not the configured identity.
    #[error("Invalid credentials for {0}")]
    Rejected(String),
}

impl AuthError {
    /// Whether the client made a syntax error, as opposed to presenting bad
    /// credentials
    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Why a completed message could not be processed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Rule lookup failed: {0}")]
    Lookup(#[from] mailpush_store::StoreError),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

//! Error types for the responder.
//!
//! Startup errors (`ConfigError`, `BindError`) are fatal. `ConnectionError`
//! only ever ends the connection it was raised on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete startup configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field was empty.
    #[error("missing required value: {0}")]
    MissingField(&'static str),

    /// Port outside 1..=65535.
    #[error("invalid port: {0} (expected 1-65535)")]
    InvalidPort(u16),

    /// Status code outside 100..=599.
    #[error("invalid status code: {0} (expected 100-599)")]
    InvalidStatus(u16),
}

/// The listening socket could not be opened.
#[derive(Debug, Error)]
#[error("failed to bind {addr}: {source}")]
pub struct BindError {
    pub addr: String,
    #[source]
    pub source: io::Error,
}

/// Failure while handling a single connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Request line, headers or body could not be read as declared.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Request used a method other than POST.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The canned response body could not be loaded.
    #[error("response body unavailable from {}: {source}", path.display())]
    BodyUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Socket error while reading or writing.
    #[error("connection i/o error: {0}")]
    Io(#[from] io::Error),

    /// Response could not be assembled.
    #[error("invalid response: {0}")]
    Http(#[from] http::Error),
}

impl ConnectionError {
    /// Whether this failure points at the server's own configuration rather
    /// than at the client.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, ConnectionError::BodyUnavailable { .. })
    }
}

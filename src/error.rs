//! Error types for artifact-dl
//!
//! The error taxonomy follows how the dispatcher has to react:
//! - [`Error::JobNotFound`] — the status endpoint does not know the job yet;
//!   an expected condition recovered by retrying on the next tick, never
//!   surfaced to the user.
//! - Transport-level failures ([`Error::Network`], [`Error::Api`]) — surfaced
//!   as a generic error notification; the affected task stays queued.
//! - Everything else is a local fault (configuration, persistence, delivery).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for artifact-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for artifact-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Status or artifact endpoint returned 404 — the job is not materialized
    /// server-side yet. Expected, not a failure; retried on the next tick.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Server answered with a non-success status other than 404
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code returned by the server
        status: u16,
        /// Response body or a short description of the failure
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact delivery error (filename/collision/write problems)
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl Error {
    /// Whether this error means the job is not registered server-side yet
    ///
    /// The dispatcher treats such errors as a silent "retry next tick"
    /// condition rather than a user-visible failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::JobNotFound(_))
    }
}

/// Errors raised while writing a fetched artifact to disk
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Target file already exists and the collision action is Skip
    #[error("file already exists: {path}")]
    FileCollision {
        /// The path that already exists
        path: PathBuf,
    },

    /// Could not derive a usable target path
    #[error("invalid delivery path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why the path is unusable
        reason: String,
    },

    /// Writing or renaming the artifact file failed
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The path being written
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },
}

//! Error types for registry operations.

use std::path::PathBuf;
use stratum_core::{Digest, DigestParseError, SigningError};
use thiserror::Error;

/// Errors that can occur during registry operations.
///
/// Every operation fails fast: there is no retry or backoff anywhere in this
/// crate, and partial pull output on disk is surfaced rather than rolled back.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to the registry.
    #[error("failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The session bootstrap was rejected.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Manifest or blob absent from the registry.
    #[error("not found: {repository}@{reference}")]
    NotFound {
        /// Repository name.
        repository: String,
        /// Tag or digest that was requested.
        reference: String,
    },

    /// Unexpected HTTP response from the registry.
    #[error("HTTP error from registry: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Downloaded content does not match its declared digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest declared by the manifest.
        expected: Digest,
        /// Digest computed from the transferred bytes.
        actual: Digest,
    },

    /// The registry returned a malformed digest.
    #[error("invalid digest from registry: {0}")]
    InvalidDigest(#[from] DigestParseError),

    /// Manifest signing failed during publish.
    #[error("manifest signing failed: {0}")]
    Signing(#[from] SigningError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file create/read/write failure.
    #[error("file I/O error at {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Blob upload failed.
    #[error("failed to upload blob: {message}")]
    UploadFailed {
        /// Error message.
        message: String,
    },

    /// Manifest push failed.
    #[error("failed to push manifest for {repository}:{tag}: {message}")]
    ManifestPushFailed {
        /// Repository name.
        repository: String,
        /// Tag.
        tag: String,
        /// Error message.
        message: String,
    },
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::Http {
                status,
                message: err.to_string(),
            }
        }
    }
}

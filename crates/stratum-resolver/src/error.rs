//! Error types for resource resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a tagged resource.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The base URL could not be parsed.
    #[error("invalid base URL: {url}")]
    InvalidBaseUrl {
        /// URL string.
        url: String,
    },

    /// Neither the specific resource nor the fallback exists.
    #[error("resource not found: {name}/{tag}/{resource} (fallback {fallback} also absent)")]
    NotFound {
        /// Lowercased resource name.
        name: String,
        /// Lowercased tag.
        tag: String,
        /// Requested resource file.
        resource: String,
        /// Fallback file that was also tried.
        fallback: String,
    },

    /// Unexpected HTTP response; no fallback is attempted for these.
    #[error("HTTP error fetching {url}: {status}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Transport failure.
    #[error("transfer failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Local file create/write failure.
    #[error("file I/O error at {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

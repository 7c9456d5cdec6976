//! Content digests used as both identity and lookup key.
//!
//! A [`Digest`] pairs a hash algorithm tag with the hex payload of the hash,
//! rendered canonically as `algorithm:hex` (e.g. `sha256:6c3c62...`). The hex
//! payload doubles as the on-disk filename for a downloaded blob and as the
//! key for registry existence checks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Errors from parsing a digest string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    /// The string contains no `:` separator.
    #[error("digest '{0}' is missing the 'algorithm:hex' separator")]
    MissingSeparator(String),

    /// The algorithm segment is empty or not alphanumeric.
    #[error("digest '{0}' has an invalid algorithm segment")]
    InvalidAlgorithm(String),

    /// The payload segment is empty or not hexadecimal.
    #[error("digest '{0}' has a non-hexadecimal payload")]
    InvalidHex(String),
}

/// A content digest: algorithm tag plus lowercase hex payload.
///
/// Digests are comparable, hashable, and serialize as their canonical
/// string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Computes the SHA-256 digest of in-memory content.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_core::Digest;
    ///
    /// let digest = Digest::sha256(b"hello");
    /// assert!(digest.to_string().starts_with("sha256:"));
    /// ```
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self {
            algorithm: "sha256".to_string(),
            hex: hex::encode(hasher.finalize()),
        }
    }

    /// Computes the SHA-256 digest of a file by streaming its contents.
    ///
    /// The file is read in chunks so arbitrarily large blobs can be hashed
    /// without loading them into memory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened or read.
    pub async fn sha256_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256Stream::new();
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hasher.finish())
    }

    /// Builds a digest from an algorithm tag and a hex payload.
    ///
    /// # Errors
    ///
    /// Returns an error if either segment is malformed.
    pub fn from_parts(algorithm: &str, hex: &str) -> Result<Self, DigestParseError> {
        let canonical = format!("{algorithm}:{hex}");
        canonical.parse()
    }

    /// Returns the algorithm tag (e.g. `sha256`).
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the hex payload without the algorithm prefix.
    ///
    /// This is the value used as a blob's local filename.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

/// Incrementally hashes streamed content into a [`Digest`].
///
/// Used while copying a blob to disk so the transfer and the hash share one
/// pass over the data.
#[derive(Debug, Default)]
pub struct Sha256Stream {
    hasher: Sha256,
}

impl Sha256Stream {
    /// Creates a new empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of content into the hasher.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Finalizes the hash and returns the resulting digest.
    #[must_use]
    pub fn finish(self) -> Digest {
        Digest {
            algorithm: "sha256".to_string(),
            hex: hex::encode(self.hasher.finalize()),
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| DigestParseError::MissingSeparator(s.to_string()))?;

        if algorithm.is_empty() || !algorithm.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DigestParseError::InvalidAlgorithm(s.to_string()));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestParseError::InvalidHex(s.to_string()));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_ascii_lowercase(),
        })
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

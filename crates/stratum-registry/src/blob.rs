//! Blob transfer: ordered layer pulls and idempotent pushes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use stratum_core::{Digest, Sha256Stream};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::error::RegistryError;
use crate::oci::{ImageReference, LayerDescriptor, ManifestV2};
use crate::progress::ProgressObserver;
use crate::session::Session;

/// Result of a completed download pass.
///
/// The ordered `layers` sequence matches manifest layer order exactly, and
/// the `sizes` map has one entry per element of that sequence. On-disk blobs
/// persist independently as the content-addressed store.
#[derive(Debug, Default)]
pub struct PullRecord {
    /// Declared size per downloaded file.
    pub sizes: HashMap<PathBuf, u64>,

    /// Downloaded file paths in manifest layer order.
    pub layers: Vec<PathBuf>,
}

impl PullRecord {
    /// Number of layers downloaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if nothing was downloaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Sum of the declared sizes of all downloaded layers.
    #[must_use]
    pub fn total_declared_bytes(&self) -> u64 {
        self.sizes.values().sum()
    }
}

/// What a push did with the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAction {
    /// The registry already held the content; no data was transferred.
    Skipped,

    /// The blob was uploaded.
    Uploaded,
}

/// Result of a successful push.
#[derive(Debug)]
pub struct PushOutcome {
    /// Content digest of the pushed blob.
    pub digest: Digest,

    /// Whether the upload was performed or skipped.
    pub action: PushAction,
}

/// Errors from the push direction.
///
/// Once the local digest has been computed it is carried in the error, so
/// callers can reconcile state even when the transfer itself fails.
#[derive(Debug, Error)]
pub enum PushError {
    /// The local blob could not be read for digest computation.
    #[error("could not digest local blob {path}: {source}")]
    Digest {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Existence check or upload failed after the digest was computed.
    #[error("push of blob {digest} failed: {source}")]
    Transfer {
        /// Computed content digest.
        digest: Digest,
        /// Underlying error.
        #[source]
        source: RegistryError,
    },
}

impl PushError {
    /// Returns the computed digest, when one exists.
    #[must_use]
    pub const fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Digest { .. } => None,
            Self::Transfer { digest, .. } => Some(digest),
        }
    }
}

/// Blob transfer service bound to a registry session.
#[derive(Debug)]
pub struct BlobTransferService<'s> {
    session: &'s Session,
}

impl<'s> BlobTransferService<'s> {
    /// Creates a blob transfer service for a session.
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Downloads every layer of a manifest into the destination folder.
    ///
    /// Layers are pulled strictly in manifest order, one at a time; each
    /// blob lands in a file named by its digest's hex value. The operation
    /// is all-or-nothing: the first failure aborts the pull, but files
    /// written for earlier layers are not rolled back and remain on disk.
    ///
    /// Downloaded content is verified against the descriptor digest after
    /// transfer; a mismatch fails the pull with
    /// [`RegistryError::ChecksumMismatch`].
    ///
    /// # Errors
    ///
    /// Returns the first transfer, verification, or file I/O error.
    pub async fn pull(
        &self,
        reference: &ImageReference,
        manifest: &ManifestV2,
        dest: &Path,
    ) -> Result<PullRecord, RegistryError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|source| RegistryError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        let mut record = PullRecord::default();
        for layer in &manifest.layers {
            let path = self.pull_layer(reference, layer, dest).await?;
            record.sizes.insert(path.clone(), layer.size);
            record.layers.push(path);
        }

        tracing::info!(
            reference = %reference,
            layers = record.len(),
            bytes = record.total_declared_bytes(),
            "pull complete",
        );
        Ok(record)
    }

    /// Downloads one layer blob to `dest/{digest hex}`.
    async fn pull_layer(
        &self,
        reference: &ImageReference,
        layer: &LayerDescriptor,
        dest: &Path,
    ) -> Result<PathBuf, RegistryError> {
        let url = self
            .session
            .v2_url(reference.repository(), &format!("blobs/{}", layer.digest));
        let response = self
            .session
            .http()
            .get(&url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(RegistryError::NotFound {
                repository: reference.repository().to_string(),
                reference: layer.digest.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(RegistryError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let path = dest.join(layer.digest.hex());
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(
            media_type = %layer.media_type,
            size = layer.size,
            "downloading layer",
        );
        let observer = ProgressObserver::spawn(path.clone(), layer.size);

        let mut hasher = Sha256Stream::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|source| RegistryError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        file.flush()
            .await
            .map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
        observer.finish().await;

        let actual = hasher.finish();
        if actual != layer.digest {
            return Err(RegistryError::ChecksumMismatch {
                expected: layer.digest.clone(),
                actual,
            });
        }

        Ok(path)
    }

    /// Pushes a local blob, skipping the upload when the registry already
    /// holds the content.
    ///
    /// Re-running a push with unchanged content performs zero data transfer:
    /// the existence check answers from the computed digest and the upload
    /// step is never entered.
    ///
    /// # Errors
    ///
    /// Returns a [`PushError`]; after digest computation succeeds, the error
    /// carries the digest so the caller can reconcile state.
    pub async fn push(
        &self,
        reference: &ImageReference,
        file: &Path,
    ) -> Result<PushOutcome, PushError> {
        let digest = Digest::sha256_file(file)
            .await
            .map_err(|source| PushError::Digest {
                path: file.to_path_buf(),
                source,
            })?;

        let exists = self
            .blob_exists(reference, &digest)
            .await
            .map_err(|source| PushError::Transfer {
                digest: digest.clone(),
                source,
            })?;

        if exists {
            tracing::info!(digest = %digest, "blob already present, skipping upload");
            return Ok(PushOutcome {
                digest,
                action: PushAction::Skipped,
            });
        }

        self.upload_blob(reference, &digest, file)
            .await
            .map_err(|source| PushError::Transfer {
                digest: digest.clone(),
                source,
            })?;

        tracing::info!(digest = %digest, "blob uploaded");
        Ok(PushOutcome {
            digest,
            action: PushAction::Uploaded,
        })
    }

    /// Queries the registry for blob existence under a digest.
    async fn blob_exists(
        &self,
        reference: &ImageReference,
        digest: &Digest,
    ) -> Result<bool, RegistryError> {
        let url = self
            .session
            .v2_url(reference.repository(), &format!("blobs/{digest}"));
        let response = self
            .session
            .http()
            .head(&url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(true);
        }
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        Err(RegistryError::Http {
            status: response.status().as_u16(),
            message: String::new(),
        })
    }

    /// Uploads a local blob under its digest via the two-step upload flow.
    async fn upload_blob(
        &self,
        reference: &ImageReference,
        digest: &Digest,
        file: &Path,
    ) -> Result<(), RegistryError> {
        // Start an upload session.
        let start_url = self
            .session
            .v2_url(reference.repository(), "blobs/uploads/");
        let response = self
            .session
            .http()
            .post(&start_url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 202 {
            return Err(RegistryError::UploadFailed {
                message: format!("failed to start upload: {}", response.status()),
            });
        }

        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RegistryError::UploadFailed {
                message: "no upload location returned".to_string(),
            })?;
        let location = if location.starts_with('/') {
            format!("{}{location}", self.session.endpoint().url)
        } else {
            location.to_string()
        };

        let upload_url = if location.contains('?') {
            format!("{location}&digest={digest}")
        } else {
            format!("{location}?digest={digest}")
        };

        // Stream the blob so multi-gigabyte layers are never buffered whole.
        let blob = tokio::fs::File::open(file)
            .await
            .map_err(|source| RegistryError::Io {
                path: file.to_path_buf(),
                source,
            })?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(blob));

        let response = self
            .session
            .http()
            .put(&upload_url)
            .headers(self.session.auth_headers()?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 201 {
            return Err(RegistryError::UploadFailed {
                message: format!("failed to upload blob: {}", response.status()),
            });
        }

        Ok(())
    }
}

//! # Stratum Registry
//!
//! Registry connector, manifest service, and blob transfer service for the
//! Stratum image transfer engine.
//!
//! A [`Session`] is created per top-level operation against a
//! [`RegistryEndpoint`]; [`ManifestService`] resolves manifests and
//! [`BlobTransferService`] moves content-addressed blobs, skipping uploads
//! the registry already holds. Long-running downloads are observed by an
//! independent [`ProgressObserver`] task per layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stratum_registry::{pull_image, ImageReference, RegistryEndpoint, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratum_registry::RegistryError> {
//!     let session = Session::connect(RegistryEndpoint::docker_hub()).await?;
//!
//!     let reference = ImageReference::new("ubuntu", "22.04");
//!     let record = pull_image(&session, &reference, Path::new("/var/lib/stratum/blobs")).await?;
//!
//!     for layer in &record.layers {
//!         println!("{}", layer.display());
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod config;
mod error;
mod manifest;
mod oci;
mod progress;
mod session;

pub use blob::{BlobTransferService, PullRecord, PushAction, PushError, PushOutcome};
pub use config::{RegistryAuth, RegistryEndpoint, DEFAULT_REGISTRY_URL};
pub use error::RegistryError;
pub use manifest::ManifestService;
pub use oci::{
    FsLayer, ImageReference, LayerDescriptor, ManifestV1, ManifestV2, MediaType, RepositoryList,
    SignedManifestV1, TagList,
};
pub use progress::ProgressObserver;
pub use session::{Session, DEFAULT_NAMESPACE};

use std::path::Path;

/// Downloads every layer of an image into a destination folder.
///
/// Resolves the manifest for the reference, then pulls its layers strictly
/// in manifest order. See [`BlobTransferService::pull`] for the failure and
/// rollback semantics.
///
/// # Errors
///
/// Returns the manifest resolution error or the first transfer error.
pub async fn pull_image(
    session: &Session,
    reference: &ImageReference,
    dest: &Path,
) -> Result<PullRecord, RegistryError> {
    let manifest = ManifestService::new(session)
        .fetch_manifest(reference)
        .await?;
    BlobTransferService::new(session)
        .pull(reference, &manifest, dest)
        .await
}

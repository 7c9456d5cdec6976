//! Registry wire types.
//!
//! Schema-2 manifests are fetched for download planning; schema-1 signed
//! envelopes are built locally for publish operations. Layer order inside a
//! manifest is the application order for reconstructing a filesystem and is
//! preserved end-to-end.

use crate::session::Session;
use serde::{Deserialize, Serialize};
use stratum_core::{Digest, EphemeralKey, ManifestSignature, SigningError};

/// A (name, tag) image reference.
///
/// The name is normalized into the registry namespace convention at
/// construction, so every remote call sees the same repository string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Creates a reference, normalizing the name.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_registry::ImageReference;
    ///
    /// let reference = ImageReference::new("ubuntu", "22.04");
    /// assert_eq!(reference.repository(), "library/ubuntu");
    /// assert_eq!(reference.tag(), "22.04");
    /// ```
    #[must_use]
    pub fn new(name: &str, tag: impl Into<String>) -> Self {
        Self {
            repository: Session::normalize_name(name),
            tag: tag.into(),
        }
    }

    /// Returns the normalized repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Media types used on the registry wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// Schema-2 image manifest media type.
    pub const MANIFEST_V2: &'static str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Signed schema-1 manifest media type.
    pub const MANIFEST_V1_SIGNED: &'static str =
        "application/vnd.docker.distribution.manifest.v1+prettyjws";

    /// Gzipped layer tarball media type.
    pub const LAYER_TAR_GZIP: &'static str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

    /// Creates a new media type.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    /// Returns the media type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for MediaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// One entry in a schema-2 manifest's ordered layer list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    /// Media type of the layer blob.
    pub media_type: MediaType,

    /// Content digest, used as transfer key and local filename.
    pub digest: Digest,

    /// Size in bytes declared by the registry. Treated as ground truth for
    /// progress calculation, not verified against transferred bytes.
    pub size: u64,
}

/// A schema-2 image manifest: version metadata plus the ordered layer list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestV2 {
    /// Schema version (2 for fetched manifests).
    pub schema_version: u32,

    /// Media type of this manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Image configuration descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<LayerDescriptor>,

    /// Ordered layers; order is the filesystem application order.
    pub layers: Vec<LayerDescriptor>,
}

impl ManifestV2 {
    /// Sum of the declared layer sizes.
    #[must_use]
    pub fn total_declared_bytes(&self) -> u64 {
        self.layers.iter().map(|l| l.size).sum()
    }
}

/// A schema-1 filesystem layer entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsLayer {
    /// Blob digest for this layer.
    pub blob_sum: Digest,
}

/// A schema-1 manifest envelope, built locally for publish operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestV1 {
    /// Schema version, fixed at 1 for publish.
    pub schema_version: u32,

    /// Normalized repository name.
    pub name: String,

    /// Tag the manifest is published under.
    pub tag: String,

    /// Target architecture.
    pub architecture: String,

    /// Layer digests, outermost first.
    pub fs_layers: Vec<FsLayer>,
}

impl ManifestV1 {
    /// Builds an unsigned schema-1 envelope for a reference.
    #[must_use]
    pub fn new(reference: &ImageReference, layers: &[Digest]) -> Self {
        Self {
            schema_version: 1,
            name: reference.repository().to_string(),
            tag: reference.tag().to_string(),
            architecture: "amd64".to_string(),
            fs_layers: layers
                .iter()
                .map(|digest| FsLayer {
                    blob_sum: digest.clone(),
                })
                .collect(),
        }
    }

    /// Signs the envelope with an ephemeral key.
    ///
    /// # Errors
    ///
    /// Returns a [`SigningError`] if the envelope cannot be serialized for
    /// signing.
    pub fn sign(self, key: &EphemeralKey) -> Result<SignedManifestV1, SigningError> {
        let payload = serde_json::to_vec(&self)?;
        let signature = ManifestSignature::sign(key, &payload)?;
        Ok(SignedManifestV1 {
            manifest: self,
            signatures: vec![signature],
        })
    }
}

/// A signed schema-1 manifest ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedManifestV1 {
    /// The manifest fields, inlined into the envelope.
    #[serde(flatten)]
    pub manifest: ManifestV1,

    /// JWS-style signature blocks.
    pub signatures: Vec<ManifestSignature>,
}

/// Response from the `/v2/<name>/tags/list` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagList {
    /// Repository name.
    pub name: String,

    /// List of tags.
    pub tags: Vec<String>,
}

/// Response from the `/v2/_catalog` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryList {
    /// Repository names hosted by the registry.
    pub repositories: Vec<String>,
}

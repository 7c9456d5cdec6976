//! Manifest operations: fetch, publish, delete, tag listing.

use crate::error::RegistryError;
use crate::oci::{ImageReference, ManifestV1, ManifestV2, MediaType, RepositoryList, TagList};
use crate::session::Session;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use stratum_core::{Digest, EphemeralKey};

/// Digest header returned by registry manifest endpoints.
const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Manifest service bound to a registry session.
#[derive(Debug)]
pub struct ManifestService<'s> {
    session: &'s Session,
}

impl<'s> ManifestService<'s> {
    /// Creates a manifest service for a session.
    #[must_use]
    pub const fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Resolves the manifest for a reference and returns its content digest.
    ///
    /// The digest is taken from the registry's content-digest header when
    /// present, otherwise computed from the manifest body.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the manifest is absent, or a
    /// network/HTTP error otherwise.
    pub async fn fetch_digest(&self, reference: &ImageReference) -> Result<Digest, RegistryError> {
        let url = self.session.v2_url(
            reference.repository(),
            &format!("manifests/{}", reference.tag()),
        );
        let response = self
            .session
            .http()
            .get(&url)
            .headers(self.session.auth_headers()?)
            .header(ACCEPT, MediaType::MANIFEST_V2)
            .send()
            .await?;

        let response = Self::check_found(response, reference).await?;

        if let Some(header) = response.headers().get(CONTENT_DIGEST_HEADER) {
            let value = header.to_str().map_err(|_| RegistryError::Http {
                status: 0,
                message: "unreadable content-digest header".to_string(),
            })?;
            return Ok(value.parse()?);
        }

        let body = response.bytes().await?;
        Ok(Digest::sha256(&body))
    }

    /// Fetches the full schema-2 manifest for download planning.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the manifest is absent, or a
    /// network/HTTP error otherwise.
    pub async fn fetch_manifest(
        &self,
        reference: &ImageReference,
    ) -> Result<ManifestV2, RegistryError> {
        let url = self.session.v2_url(
            reference.repository(),
            &format!("manifests/{}", reference.tag()),
        );
        let response = self
            .session
            .http()
            .get(&url)
            .headers(self.session.auth_headers()?)
            .header(ACCEPT, MediaType::MANIFEST_V2)
            .send()
            .await?;

        let response = Self::check_found(response, reference).await?;
        response.json().await.map_err(Into::into)
    }

    /// Lists all tags for an image name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be contacted; a repository
    /// with no tags yields an empty list.
    pub async fn list_tags(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        let repository = Session::normalize_name(name);
        let url = self.session.v2_url(&repository, "tags/list");
        let response = self
            .session
            .http()
            .get(&url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(RegistryError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tag_list: TagList = response.json().await?;
        Ok(tag_list.tags)
    }

    /// Lists the repositories the registry hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be contacted or does not
    /// expose the catalog endpoint.
    pub async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/_catalog", self.session.endpoint().url);
        let response = self
            .session
            .http()
            .get(&url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RegistryError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let catalog: RepositoryList = response.json().await?;
        Ok(catalog.repositories)
    }

    /// Builds, signs, and submits a schema-1 manifest.
    ///
    /// A fresh ephemeral key is generated for every call and discarded
    /// afterwards; keys are never persisted or reused.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the envelope cannot be signed, or
    /// [`RegistryError::ManifestPushFailed`] if the registry rejects it.
    pub async fn publish(
        &self,
        reference: &ImageReference,
        layers: &[Digest],
    ) -> Result<(), RegistryError> {
        let key = EphemeralKey::generate();
        let signed = ManifestV1::new(reference, layers).sign(&key)?;
        let body = serde_json::to_vec(&signed)?;

        let url = self.session.v2_url(
            reference.repository(),
            &format!("manifests/{}", reference.tag()),
        );
        let response = self
            .session
            .http()
            .put(&url)
            .headers(self.session.auth_headers()?)
            .header(CONTENT_TYPE, MediaType::MANIFEST_V1_SIGNED)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 201 {
            return Err(RegistryError::ManifestPushFailed {
                repository: reference.repository().to_string(),
                tag: reference.tag().to_string(),
                message: format!(
                    "{}: {}",
                    response.status(),
                    response.text().await.unwrap_or_default()
                ),
            });
        }

        tracing::info!(reference = %reference, "published signed manifest");
        Ok(())
    }

    /// Deletes the manifest for a reference.
    ///
    /// Two round trips: the current digest is resolved first, then deletion
    /// is requested by digest. If the digest lookup fails, deletion is not
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the manifest is absent, or a
    /// network/HTTP error otherwise.
    pub async fn delete(&self, reference: &ImageReference) -> Result<(), RegistryError> {
        let digest = self.fetch_digest(reference).await?;

        let url = self
            .session
            .v2_url(reference.repository(), &format!("manifests/{digest}"));
        let response = self
            .session
            .http()
            .delete(&url)
            .headers(self.session.auth_headers()?)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(RegistryError::NotFound {
                repository: reference.repository().to_string(),
                reference: digest.to_string(),
            });
        }
        if !response.status().is_success() && response.status().as_u16() != 202 {
            return Err(RegistryError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        tracing::info!(reference = %reference, digest = %digest, "deleted manifest");
        Ok(())
    }

    /// Maps a 404 manifest response to `NotFound` and any other non-success
    /// status to `Http`.
    async fn check_found(
        response: reqwest::Response,
        reference: &ImageReference,
    ) -> Result<reqwest::Response, RegistryError> {
        if response.status().as_u16() == 404 {
            return Err(RegistryError::NotFound {
                repository: reference.repository().to_string(),
                reference: reference.tag().to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(RegistryError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryEndpoint;
    use httpmock::prelude::*;

    async fn session_for(server: &MockServer) -> Session {
        server.mock(|when, then| {
            when.method(GET).path("/v2/");
            then.status(200);
        });
        Session::connect(RegistryEndpoint::new(server.base_url()))
            .await
            .unwrap()
    }

    const MANIFEST_JSON: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "layers": [
            {
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "size": 100,
                "digest": "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f"
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_fetch_digest_from_header() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ubuntu/manifests/latest");
            then.status(200)
                .header(
                    "Docker-Content-Digest",
                    "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f",
                )
                .body(MANIFEST_JSON);
        });

        let reference = ImageReference::new("ubuntu", "latest");
        let digest = ManifestService::new(&session)
            .fetch_digest(&reference)
            .await
            .unwrap();

        assert_eq!(
            digest.hex(),
            "e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f"
        );
    }

    #[tokio::test]
    async fn test_fetch_digest_computed_without_header() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ubuntu/manifests/latest");
            then.status(200).body(MANIFEST_JSON);
        });

        let reference = ImageReference::new("ubuntu", "latest");
        let digest = ManifestService::new(&session)
            .fetch_digest(&reference)
            .await
            .unwrap();

        assert_eq!(digest, Digest::sha256(MANIFEST_JSON.as_bytes()));
    }

    #[tokio::test]
    async fn test_fetch_manifest_not_found() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ghost/manifests/v1");
            then.status(404);
        });

        let reference = ImageReference::new("ghost", "v1");
        let err = ManifestService::new(&session)
            .fetch_manifest(&reference)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_manifest_preserves_layer_order() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ubuntu/manifests/latest");
            then.status(200).body(MANIFEST_JSON);
        });

        let reference = ImageReference::new("ubuntu", "latest");
        let manifest = ManifestService::new(&session)
            .fetch_manifest(&reference)
            .await
            .unwrap();

        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].size, 100);
    }

    #[tokio::test]
    async fn test_publish_submits_signed_envelope() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/v2/library/myimg/manifests/v1")
                .body_contains("\"schemaVersion\":1")
                .body_contains("\"signatures\"");
            then.status(201);
        });

        let reference = ImageReference::new("myimg", "v1");
        ManifestService::new(&session)
            .publish(&reference, &[Digest::sha256(b"layer")])
            .await
            .unwrap();

        put.assert();
    }

    #[tokio::test]
    async fn test_delete_resolves_digest_first() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        let digest = "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f";
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/myimg/manifests/v1");
            then.status(200)
                .header("Docker-Content-Digest", digest)
                .body(MANIFEST_JSON);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE)
                .path(format!("/v2/library/myimg/manifests/{digest}"));
            then.status(202);
        });

        let reference = ImageReference::new("myimg", "v1");
        ManifestService::new(&session).delete(&reference).await.unwrap();

        delete.assert();
    }

    #[tokio::test]
    async fn test_delete_skipped_when_digest_lookup_fails() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/myimg/manifests/v1");
            then.status(404);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE);
            then.status(202);
        });

        let reference = ImageReference::new("myimg", "v1");
        let err = ManifestService::new(&session)
            .delete(&reference)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::NotFound { .. }));
        delete.assert_hits(0);
    }

    #[tokio::test]
    async fn test_list_tags() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ubuntu/tags/list");
            then.status(200)
                .body(r#"{"name":"library/ubuntu","tags":["20.04","22.04","latest"]}"#);
        });

        let tags = ManifestService::new(&session)
            .list_tags("ubuntu")
            .await
            .unwrap();
        assert_eq!(tags, vec!["20.04", "22.04", "latest"]);
    }

    #[tokio::test]
    async fn test_list_repositories() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/_catalog");
            then.status(200)
                .body(r#"{"repositories":["library/ubuntu","myorg/app"]}"#);
        });

        let repositories = ManifestService::new(&session)
            .list_repositories()
            .await
            .unwrap();
        assert_eq!(repositories, vec!["library/ubuntu", "myorg/app"]);
    }

    #[tokio::test]
    async fn test_list_repositories_unsupported_catalog() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/_catalog");
            then.status(404);
        });

        let err = ManifestService::new(&session)
            .list_repositories()
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_list_tags_missing_repository_is_empty() {
        let server = MockServer::start();
        let session = session_for(&server).await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/library/ghost/tags/list");
            then.status(404);
        });

        let tags = ManifestService::new(&session)
            .list_tags("ghost")
            .await
            .unwrap();
        assert!(tags.is_empty());
    }
}

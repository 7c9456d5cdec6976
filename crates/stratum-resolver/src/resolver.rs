//! Two-tier fallback resource resolution.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::ResolveError;

/// Parameters for one resource fetch.
///
/// Name and tag are lowercased at construction. The fallback defaults to
/// `default.{resource}`; variants with a different fallback convention (the
/// settings file falls back to `default.yml`) override it.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// Lowercased image name.
    pub name: String,

    /// Lowercased tag.
    pub tag: String,

    /// Resource file to fetch, also the local output filename.
    pub resource: String,

    /// Fallback file tried when the specific resource is absent.
    pub fallback: String,
}

impl ResourceRequest {
    /// Creates a request with the default fallback naming.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_resolver::ResourceRequest;
    ///
    /// let request = ResourceRequest::new("MyImg", "V1", "env.conf");
    /// assert_eq!(request.name, "myimg");
    /// assert_eq!(request.tag, "v1");
    /// assert_eq!(request.fallback, "default.env.conf");
    /// ```
    #[must_use]
    pub fn new(name: &str, tag: &str, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            name: name.to_lowercase(),
            tag: tag.to_lowercase(),
            fallback: format!("default.{resource}"),
            resource,
        }
    }

    /// Overrides the fallback filename.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }
}

/// Fetches per-(name, tag) configuration resources with a default fallback.
#[derive(Debug)]
pub struct TaggedResourceResolver {
    base_url: String,
    http: reqwest::Client,
}

impl TaggedResourceResolver {
    /// Creates a resolver for a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidBaseUrl`] if the URL cannot be parsed,
    /// or a network error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ResolveError> {
        let mut base_url = base_url.into();
        Url::parse(&base_url).map_err(|_| ResolveError::InvalidBaseUrl {
            url: base_url.clone(),
        })?;
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let http = reqwest::Client::builder().build()?;
        Ok(Self { base_url, http })
    }

    /// Resolves a resource, trying the specific path first and the fallback
    /// on 404.
    ///
    /// The successful response body is streamed to `{dest}/{resource}`,
    /// overwriting any existing file. The destination file is only created
    /// after a successful response, so an exhausted fallback leaves no file
    /// behind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when both tiers 404. Any other
    /// non-success status or transport failure propagates without fallback.
    pub async fn resolve(
        &self,
        request: &ResourceRequest,
        dest: &Path,
    ) -> Result<PathBuf, ResolveError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|source| ResolveError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        let specific = format!(
            "{}/{}/{}/{}",
            self.base_url, request.name, request.tag, request.resource
        );
        let response = match self.fetch(&specific).await? {
            Some(response) => response,
            None => {
                let fallback = format!("{}/{}", self.base_url, request.fallback);
                tracing::debug!(url = %fallback, "specific resource absent, trying fallback");
                self.fetch(&fallback)
                    .await?
                    .ok_or_else(|| ResolveError::NotFound {
                        name: request.name.clone(),
                        tag: request.tag.clone(),
                        resource: request.resource.clone(),
                        fallback: request.fallback.clone(),
                    })?
            }
        };

        let path = dest.join(&request.resource);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| ResolveError::Io {
                path: path.clone(),
                source,
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| ResolveError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        file.flush().await.map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(resource = %request.resource, path = %path.display(), "resource resolved");
        Ok(path)
    }

    /// Convenience for the settings resource, which falls back to
    /// `default.yml` rather than the generic `default.setting.yml`.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub async fn resolve_settings(
        &self,
        name: &str,
        tag: &str,
        dest: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let request = ResourceRequest::new(name, tag, "setting.yml").with_fallback("default.yml");
        self.resolve(&request, dest).await
    }

    /// Fetches a URL; `None` signals a 404, any other non-success status is
    /// an error.
    async fn fetch(&self, url: &str) -> Result<Option<reqwest::Response>, ResolveError> {
        let response = self.http.get(url).send().await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ResolveError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(Some(response))
    }
}

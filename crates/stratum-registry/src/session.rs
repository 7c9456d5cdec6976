//! Registry connector: session bootstrap and name normalization.
//!
//! A [`Session`] is created per top-level operation and discarded on
//! completion. Construction performs the `/v2/` bootstrap ping, so a failed
//! authentication attempt is reported immediately with no retry.

use crate::config::{RegistryAuth, RegistryEndpoint};
use crate::error::RegistryError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

/// Default namespace prepended to bare image names.
pub const DEFAULT_NAMESPACE: &str = "library";

/// An authenticated registry session.
///
/// All higher-level services (manifest, blob transfer) route their requests
/// through a session, which owns the HTTP client and the endpoint
/// credentials.
#[derive(Debug)]
pub struct Session {
    endpoint: RegistryEndpoint,
    http: reqwest::Client,
}

impl Session {
    /// Connects to the registry, verifying credentials against the `/v2/`
    /// API root.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AuthenticationFailed`] when the registry
    /// rejects the credentials, or a connection/HTTP error otherwise. A
    /// single failed attempt is terminal; there is no retry.
    pub async fn connect(endpoint: RegistryEndpoint) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent(&endpoint.user_agent)
            .build()
            .map_err(|source| RegistryError::ConnectionFailed {
                url: endpoint.url.clone(),
                source,
            })?;

        let session = Self { endpoint, http };
        session.ping().await?;

        tracing::debug!(url = %session.endpoint.url, "registry session established");
        Ok(session)
    }

    /// Verifies the session against the registry API root.
    async fn ping(&self) -> Result<(), RegistryError> {
        let url = format!("{}/v2/", self.endpoint.url);
        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RegistryError::AuthenticationFailed {
                message: format!("registry at {} rejected credentials ({status})", self.endpoint.url),
            });
        }
        Err(RegistryError::Http {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }

    /// Normalizes an image name into the registry's namespace convention.
    ///
    /// Names with no namespace separator get the default namespace
    /// prepended; the operation is idempotent.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_registry::Session;
    ///
    /// assert_eq!(Session::normalize_name("ubuntu"), "library/ubuntu");
    /// assert_eq!(Session::normalize_name("library/ubuntu"), "library/ubuntu");
    /// assert_eq!(Session::normalize_name("myorg/app"), "myorg/app");
    /// ```
    #[must_use]
    pub fn normalize_name(name: &str) -> String {
        if name.contains('/') {
            name.to_string()
        } else {
            format!("{DEFAULT_NAMESPACE}/{name}")
        }
    }

    /// Returns the endpoint this session is bound to.
    #[must_use]
    pub const fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    /// Returns the shared HTTP client.
    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Builds the base URL for a repository-scoped API path.
    pub(crate) fn v2_url(&self, repository: &str, suffix: &str) -> String {
        format!("{}/v2/{repository}/{suffix}", self.endpoint.url)
    }

    /// Creates authentication headers for the configured credentials.
    pub(crate) fn auth_headers(&self) -> Result<HeaderMap, RegistryError> {
        let mut headers = HeaderMap::new();

        match &self.endpoint.auth {
            RegistryAuth::None => {}
            RegistryAuth::Basic { username, password } => {
                let credentials = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{password}"),
                );
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|_| {
                        RegistryError::AuthenticationFailed {
                            message: "invalid credentials".to_string(),
                        }
                    })?,
                );
            }
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_normalize_name_idempotent() {
        let once = Session::normalize_name("ubuntu");
        assert_eq!(once, "library/ubuntu");
        assert_eq!(Session::normalize_name(&once), once);
    }

    #[test]
    fn test_normalize_name_keeps_existing_namespace() {
        assert_eq!(Session::normalize_name("myorg/app"), "myorg/app");
    }

    #[tokio::test]
    async fn test_connect_pings_api_root() {
        let server = MockServer::start();
        let ping = server.mock(|when, then| {
            when.method(GET).path("/v2/");
            then.status(200);
        });

        let session = Session::connect(RegistryEndpoint::new(server.base_url()))
            .await
            .unwrap();

        ping.assert();
        assert_eq!(session.endpoint().url, server.base_url());
    }

    #[tokio::test]
    async fn test_connect_rejected_credentials() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/");
            then.status(401);
        });

        let endpoint = RegistryEndpoint::new(server.base_url())
            .with_auth(RegistryAuth::basic("user", "wrong"));
        let err = Session::connect(endpoint).await.unwrap_err();

        assert!(matches!(err, RegistryError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_connect_sends_basic_auth_header() {
        let server = MockServer::start();
        let ping = server.mock(|when, then| {
            // base64("user:pass")
            when.method(GET)
                .path("/v2/")
                .header("authorization", "Basic dXNlcjpwYXNz");
            then.status(200);
        });

        let endpoint = RegistryEndpoint::new(server.base_url())
            .with_auth(RegistryAuth::basic("user", "pass"));
        Session::connect(endpoint).await.unwrap();

        ping.assert();
    }
}

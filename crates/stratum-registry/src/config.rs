//! Configuration types for the registry connector.

/// Default registry endpoint when none is supplied.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry-1.docker.io";

/// A registry endpoint: base URL plus optional credentials.
///
/// Immutable after construction; the connector session takes exclusive
/// ownership of it and discards it when the operation completes.
///
/// There is deliberately no timeout knob: a blocked registry connection
/// blocks the whole operation, and callers wanting bounded latency must wrap
/// calls externally.
#[derive(Debug, Clone)]
pub struct RegistryEndpoint {
    /// Registry base URL (e.g. "<https://registry-1.docker.io>").
    pub url: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// User agent string sent with every request.
    pub user_agent: String,
}

impl RegistryEndpoint {
    /// Creates an endpoint for the given URL with no credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_registry::RegistryEndpoint;
    ///
    /// let endpoint = RegistryEndpoint::new("https://registry.example.com");
    /// assert_eq!(endpoint.url, "https://registry.example.com");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self {
            url,
            auth: RegistryAuth::None,
            user_agent: format!("stratum-registry/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Creates an endpoint for the fixed default registry.
    #[must_use]
    pub fn docker_hub() -> Self {
        Self::new(DEFAULT_REGISTRY_URL)
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Authentication methods for registry access.
#[derive(Debug, Clone)]
pub enum RegistryAuth {
    /// Anonymous access.
    None,

    /// Basic authentication with username and password.
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "pass");
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

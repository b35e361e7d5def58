//! Authorization configuration

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigurationError;

const PUBLIC_KEY_PATH: &str = "/oauth/token_key";

const fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_max_age() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

const fn default_min_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for the token verification and authorization pipeline
///
/// All defaults are applied once, when the configuration is constructed,
/// rather than being re-derived on every call. Use [`AuthConfig::builder`]
/// to construct a configuration in code; the type also deserializes from
/// configuration files using camel-cased keys (`baseUrl`, `resourceName`,
/// `publicKeyEndpoints`, ...). Duration fields are given in seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    base_url: String,
    resource_name: String,
    #[serde(default)]
    public_key_url: Option<String>,
    #[serde(default)]
    public_key_endpoints: Vec<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    ecdsa_keys: Vec<String>,
    #[serde(default)]
    rsa_keys: Vec<String>,
    #[serde(
        default = "default_fetch_timeout",
        deserialize_with = "duration_secs"
    )]
    fetch_timeout: Duration,
    #[serde(default = "default_max_age", deserialize_with = "duration_secs")]
    max_age: Duration,
    #[serde(
        default = "default_min_refresh_interval",
        deserialize_with = "duration_secs"
    )]
    min_refresh_interval: Duration,
}

fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl AuthConfig {
    /// Starts building a configuration for the given token issuer base
    /// URL and the audience identifier of this resource server
    pub fn builder(
        base_url: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> AuthConfigBuilder {
        AuthConfigBuilder {
            config: AuthConfig {
                base_url: base_url.into(),
                resource_name: resource_name.into(),
                public_key_url: None,
                public_key_endpoints: Vec::new(),
                issuer: None,
                ecdsa_keys: Vec::new(),
                rsa_keys: Vec::new(),
                fetch_timeout: default_fetch_timeout(),
                max_age: default_max_age(),
                min_refresh_interval: default_min_refresh_interval(),
            },
        }
    }

    /// The base URL of the token issuer
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The audience identifier tokens must carry to be accepted here
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// The primary public key endpoint
    ///
    /// Defaults to `{baseUrl}/oauth/token_key` when not set explicitly.
    /// An explicitly empty URL disables the default endpoint, leaving
    /// only [`public_key_endpoints`](Self::public_key_endpoints) and any
    /// inline keys.
    #[must_use]
    pub fn public_key_url(&self) -> Option<String> {
        match &self.public_key_url {
            Some(url) if url.is_empty() => None,
            Some(url) => Some(url.clone()),
            None if self.base_url.is_empty() => None,
            None => Some(format!(
                "{}{}",
                self.base_url.trim_end_matches('/'),
                PUBLIC_KEY_PATH
            )),
        }
    }

    /// Additional JWKS endpoints consulted after the primary one
    #[must_use]
    pub fn public_key_endpoints(&self) -> &[String] {
        &self.public_key_endpoints
    }

    /// Every JWKS URL to load keys from, in lookup priority order
    #[must_use]
    pub fn jwks_urls(&self) -> Vec<String> {
        self.public_key_url()
            .into_iter()
            .chain(self.public_key_endpoints.iter().cloned())
            .collect()
    }

    /// The issuer tokens must name, when configured
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Inline PEM-encoded ECDSA public keys
    #[must_use]
    pub fn ecdsa_keys(&self) -> &[String] {
        &self.ecdsa_keys
    }

    /// Inline PEM-encoded RSA public keys
    #[must_use]
    pub fn rsa_keys(&self) -> &[String] {
        &self.rsa_keys
    }

    /// How long a single remote key fetch may take
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// How old the cached key set may grow before validation triggers a
    /// refresh
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// The minimum interval between refreshes triggered by verifier
    /// cache misses
    #[must_use]
    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    /// Whether any key source is configured at all
    #[must_use]
    pub fn has_key_sources(&self) -> bool {
        !self.jwks_urls().is_empty() || !self.ecdsa_keys.is_empty() || !self.rsa_keys.is_empty()
    }

    /// Checks that this configuration can verify at least one token
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoVerificationSources`] when neither
    /// a JWKS endpoint nor inline key material is configured.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.has_key_sources() {
            Ok(())
        } else {
            Err(ConfigurationError::NoVerificationSources)
        }
    }
}

/// Builder for [`AuthConfig`]
#[derive(Debug)]
#[must_use]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Overrides the primary public key endpoint
    ///
    /// An empty URL disables the default `{baseUrl}/oauth/token_key`
    /// endpoint.
    pub fn public_key_url(mut self, url: impl Into<String>) -> Self {
        self.config.public_key_url = Some(url.into());
        self
    }

    /// Adds a JWKS endpoint consulted after the primary one
    pub fn add_public_key_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.public_key_endpoints.push(url.into());
        self
    }

    /// Requires tokens to name this issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    /// Adds an inline PEM-encoded ECDSA public key
    pub fn add_ecdsa_key(mut self, pem: impl Into<String>) -> Self {
        self.config.ecdsa_keys.push(pem.into());
        self
    }

    /// Adds an inline PEM-encoded RSA public key
    pub fn add_rsa_key(mut self, pem: impl Into<String>) -> Self {
        self.config.rsa_keys.push(pem.into());
        self
    }

    /// Bounds how long a single remote key fetch may take
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Bounds how stale the cached key set may grow before validation
    /// triggers a refresh
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = max_age;
        self
    }

    /// Bounds how often verifier cache misses may trigger a refresh
    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.min_refresh_interval = interval;
        self
    }

    /// Finalizes the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoVerificationSources`] when the
    /// resulting configuration has no way to verify any token.
    pub fn build(self) -> Result<AuthConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

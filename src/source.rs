//! Key sources and the fetcher boundary

use std::fmt;

use async_trait::async_trait;

use crate::{error::JwksFetchError, jwks::KeySetDocument, verifier::TokenVerifier};

/// Retrieves key set documents from remote endpoints
///
/// This is the pluggable transport boundary: the registry decides when
/// to fetch and how to cache, a fetcher only moves bytes. The default
/// [`HttpJwksFetcher`] is available with the `reqwest` feature.
#[async_trait]
pub trait JwksFetcher: fmt::Debug + Send + Sync {
    /// Fetches and decodes the key set document at `url`
    async fn fetch(&self, url: &str) -> Result<KeySetDocument, JwksFetchError>;
}

/// One configured origin of verification keys
#[derive(Clone, Debug)]
pub(crate) enum KeySource {
    /// Keys fetched on refresh from a JWKS endpoint
    Remote { url: String },
    /// Keys parsed from inline PEM material at startup
    Static { verifiers: Vec<TokenVerifier> },
}

/// The default HTTP fetcher
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl HttpJwksFetcher {
    /// Constructs a fetcher with its own HTTP client
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("radar-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(
                    error = %err,
                    "failed to build HTTP client with custom configuration; using defaults"
                );
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Constructs a fetcher reusing an existing HTTP client
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
impl Default for HttpJwksFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, url: &str) -> Result<KeySetDocument, JwksFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(JwksFetchError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(JwksFetchError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(JwksFetchError::decode)
    }
}

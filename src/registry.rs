//! The verifier registry
//!
//! Holds the prioritized key sources and the last good key set fetched
//! from each of them. The cache is a single atomically swapped snapshot:
//! concurrent readers always observe either the old complete key set or
//! the new complete key set, never a partial update.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use jsonwebtoken::Algorithm;
use tokio::sync::Mutex;

use crate::{
    config::AuthConfig,
    error::{ConfigurationError, JwksFetchError, RefreshError},
    source::{JwksFetcher, KeySource},
    verifier::{self, TokenVerifier},
};

#[derive(Debug)]
struct CacheSnapshot {
    /// Verifiers per source, index-aligned with `RegistryInner::sources`
    keys: Vec<Vec<TokenVerifier>>,
    refreshed_at: Option<Instant>,
}

#[derive(Debug)]
struct RegistryInner {
    sources: Vec<KeySource>,
    fetcher: Arc<dyn JwksFetcher>,
    cache: ArcSwap<CacheSnapshot>,
    refresh_lock: Mutex<()>,
    resource_name: String,
    issuer: Option<String>,
    fetch_timeout: Duration,
    max_age: Duration,
    min_refresh_interval: Duration,
}

/// The registry of token verifiers across all configured key sources
#[derive(Clone, Debug)]
#[must_use]
pub struct VerifierRegistry {
    inner: Arc<RegistryInner>,
}

impl VerifierRegistry {
    /// Builds a registry from configuration using the default HTTP
    /// fetcher for remote sources
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when no key source is configured
    /// or an inline key does not parse.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigurationError> {
        Self::from_config_with_fetcher(config, Arc::new(crate::source::HttpJwksFetcher::new()))
    }

    /// Builds a registry from configuration with a caller-supplied
    /// fetcher for remote sources
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when no key source is configured
    /// or an inline key does not parse.
    pub fn from_config_with_fetcher(
        config: &AuthConfig,
        fetcher: Arc<dyn JwksFetcher>,
    ) -> Result<Self, ConfigurationError> {
        let mut sources: Vec<KeySource> = config
            .jwks_urls()
            .into_iter()
            .map(|url| KeySource::Remote { url })
            .collect();

        let statics = verifier::static_verifiers(config)?;
        if !statics.is_empty() {
            sources.push(KeySource::Static { verifiers: statics });
        }

        if sources.is_empty() {
            return Err(ConfigurationError::NoVerificationSources);
        }

        // Remote sources start empty; their keys arrive with the first
        // refresh.
        let keys = sources
            .iter()
            .map(|source| match source {
                KeySource::Static { verifiers } => verifiers.clone(),
                KeySource::Remote { .. } => Vec::new(),
            })
            .collect();

        tracing::info!(sources = sources.len(), "configured token verifier sources");

        Ok(Self {
            inner: Arc::new(RegistryInner {
                sources,
                fetcher,
                cache: ArcSwap::from_pointee(CacheSnapshot {
                    keys,
                    refreshed_at: None,
                }),
                refresh_lock: Mutex::new(()),
                resource_name: config.resource_name().to_owned(),
                issuer: config.issuer().map(ToOwned::to_owned),
                fetch_timeout: config.fetch_timeout(),
                max_age: config.max_age(),
                min_refresh_interval: config.min_refresh_interval(),
            }),
        })
    }

    /// Refreshes every remote key source
    ///
    /// Failures from individual sources are logged and skipped while the
    /// previously cached keys for that source remain valid. An error is
    /// reported only when every remote source failed; even then the
    /// existing cache stays in place.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), RefreshError> {
        let previous = self.inner.cache.load_full();
        let mut keys = Vec::with_capacity(self.inner.sources.len());
        let mut remotes = 0_usize;
        let mut failed = 0_usize;

        for (index, source) in self.inner.sources.iter().enumerate() {
            match source {
                KeySource::Static { verifiers } => keys.push(verifiers.clone()),
                KeySource::Remote { url } => {
                    remotes += 1;
                    match self.fetch_source(url).await {
                        Ok(verifiers) => {
                            tracing::info!(jwks.url = %url, keys = verifiers.len(), "key source refreshed");
                            keys.push(verifiers);
                        }
                        Err(err) => {
                            failed += 1;
                            let retained =
                                previous.keys.get(index).map(Vec::len).unwrap_or_default();
                            tracing::warn!(
                                jwks.url = %url,
                                error = %err,
                                retained,
                                "key source refresh failed; keeping previously cached keys"
                            );
                            keys.push(previous.keys.get(index).cloned().unwrap_or_default());
                        }
                    }
                }
            }
        }

        let refreshed_at = if failed < remotes || remotes == 0 {
            Some(Instant::now())
        } else {
            previous.refreshed_at
        };

        self.inner.cache.store(Arc::new(CacheSnapshot {
            keys,
            refreshed_at,
        }));

        if remotes > 0 && failed == remotes {
            Err(RefreshError { failed })
        } else {
            Ok(())
        }
    }

    async fn fetch_source(&self, url: &str) -> Result<Vec<TokenVerifier>, JwksFetchError> {
        let document = tokio::time::timeout(
            self.inner.fetch_timeout,
            self.inner.fetcher.fetch(url),
        )
        .await
        .map_err(|_| JwksFetchError::TimedOut)??;

        Ok(verifier::verifiers_from_document(
            &document,
            &self.inner.resource_name,
            self.inner.issuer.as_deref(),
        ))
    }

    /// Spawns a best-effort startup refresh
    ///
    /// A failure only logs a warning, so the service remains startable
    /// while remote keys are unreachable, at the cost of being unable to
    /// validate tokens until a later refresh succeeds.
    pub fn spawn_initial_refresh(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.refresh().await {
                tracing::warn!(
                    error = %err,
                    "initial key refresh failed; tokens cannot be validated until a refresh succeeds"
                );
            }
        });
    }

    /// A non-terminating task that refreshes the key sources on the
    /// given interval
    pub fn spawn_refresh(&self, interval: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                // Ignore any errors; we'll just try again next time
                let _ = this.refresh().await;
            }
        });
    }

    /// Refreshes when the cached key set is older than the configured
    /// maximum age; failures are soft
    pub(crate) async fn ensure_fresh(&self) {
        if !self.older_than(self.inner.max_age) {
            return;
        }
        let _guard = self.inner.refresh_lock.lock().await;
        if !self.older_than(self.inner.max_age) {
            // Another caller refreshed while we waited for the lock.
            return;
        }
        if let Err(err) = self.refresh_locked().await {
            tracing::warn!(error = %err, "scheduled key refresh failed; continuing with cached keys");
        }
    }

    /// One extra refresh after a verifier cache miss, rate-limited so a
    /// burst of unknown-key tokens cannot hammer the remote sources
    pub(crate) async fn refresh_after_miss(&self) {
        if !self.older_than(self.inner.min_refresh_interval) {
            return;
        }
        let _guard = self.inner.refresh_lock.lock().await;
        if !self.older_than(self.inner.min_refresh_interval) {
            return;
        }
        if let Err(err) = self.refresh_locked().await {
            tracing::warn!(error = %err, "key refresh after cache miss failed");
        }
    }

    fn older_than(&self, age: Duration) -> bool {
        match self.inner.cache.load().refreshed_at {
            Some(at) => at.elapsed() > age,
            None => true,
        }
    }

    /// Returns candidate verifiers for a token
    ///
    /// Exact key-id matches are preferred, across all cached sources in
    /// configured priority order. When the token carries no key id, or
    /// no cached key matches it, every algorithm-compatible key is
    /// returned so the caller can try each in turn; this supports key
    /// rotation without key-id hints.
    #[must_use]
    pub fn verifiers_for(&self, key_id: Option<&str>, algorithm: Algorithm) -> Vec<TokenVerifier> {
        let snapshot = self.inner.cache.load();

        if let Some(kid) = key_id {
            let matched: Vec<TokenVerifier> = snapshot
                .keys
                .iter()
                .flatten()
                .filter(|v| v.algorithm() == algorithm && v.key_id() == Some(kid))
                .cloned()
                .collect();
            if !matched.is_empty() {
                return matched;
            }
            tracing::debug!(%kid, ?algorithm, "no cached key matches the token key id");
        }

        snapshot
            .keys
            .iter()
            .flatten()
            .filter(|v| v.algorithm() == algorithm)
            .cloned()
            .collect()
    }

    /// Whether any verification key has been cached so far
    #[must_use]
    pub fn has_any_keys(&self) -> bool {
        self.inner.cache.load().keys.iter().any(|k| !k.is_empty())
    }

    /// The number of verification keys currently cached across all
    /// sources
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.cache.load().keys.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};

    use async_trait::async_trait;

    use super::*;
    use crate::jwks::KeySetDocument;

    const RSA_JWKS: &str = r#"{
        "keys": [{
            "kty": "RSA",
            "kid": "key-1",
            "use": "sig",
            "alg": "RS256",
            "n": "qnFnQLHoDhPJ0MjJ5rLMEbR0xs3S1MSN",
            "e": "AQAB"
        }]
    }"#;

    const SECOND_RSA_JWKS: &str = r#"{
        "keys": [{
            "kty": "RSA",
            "kid": "key-2",
            "use": "sig",
            "alg": "RS256",
            "n": "qnFnQLHoDhPJ0MjJ5rLMEbR0xs3S1MSN",
            "e": "AQAB"
        }]
    }"#;

    /// Serves one canned response per fetch, in order
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        responses: std::sync::Mutex<VecDeque<Result<String, ()>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: impl IntoIterator<Item = Result<&'static str, ()>>) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_owned))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl JwksFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<KeySetDocument, JwksFetchError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(body)) => Ok(serde_json::from_str(&body).unwrap()),
                Some(Err(())) | None => Err(JwksFetchError::UnexpectedStatus { status: 503 }),
            }
        }
    }

    /// Serves a fixed response per URL
    #[derive(Debug, Default)]
    struct MapFetcher {
        responses: HashMap<String, String>,
    }

    #[async_trait]
    impl JwksFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<KeySetDocument, JwksFetchError> {
            match self.responses.get(url) {
                Some(body) => Ok(serde_json::from_str(body).unwrap()),
                None => Err(JwksFetchError::UnexpectedStatus { status: 404 }),
            }
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::builder("https://mp.example.org", "res_test")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn refresh_populates_the_cache() {
        let registry =
            VerifierRegistry::from_config_with_fetcher(&config(), ScriptedFetcher::new([Ok(RSA_JWKS)]))
                .unwrap();

        assert!(!registry.has_any_keys());
        registry.refresh().await.unwrap();
        assert!(registry.has_any_keys());
        assert_eq!(registry.key_count(), 1);
    }

    #[tokio::test]
    async fn repeated_refresh_is_idempotent() {
        let registry = VerifierRegistry::from_config_with_fetcher(
            &config(),
            ScriptedFetcher::new([Ok(RSA_JWKS), Ok(RSA_JWKS)]),
        )
        .unwrap();

        registry.refresh().await.unwrap();
        let first = registry.key_count();
        registry.refresh().await.unwrap();
        assert_eq!(registry.key_count(), first);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_previous_keys() {
        let registry = VerifierRegistry::from_config_with_fetcher(
            &config(),
            ScriptedFetcher::new([Ok(RSA_JWKS), Err(())]),
        )
        .unwrap();

        registry.refresh().await.unwrap();
        assert_eq!(registry.key_count(), 1);

        let err = registry.refresh().await.unwrap_err();
        assert_eq!(err.failed_sources(), 1);
        assert_eq!(registry.key_count(), 1, "stale keys must outlive a failed refresh");
    }

    #[tokio::test]
    async fn rotation_replaces_the_cached_keys() {
        let registry = VerifierRegistry::from_config_with_fetcher(
            &config(),
            ScriptedFetcher::new([Ok(RSA_JWKS), Ok(SECOND_RSA_JWKS)]),
        )
        .unwrap();

        registry.refresh().await.unwrap();
        registry.refresh().await.unwrap();

        let verifiers = registry.verifiers_for(Some("key-2"), Algorithm::RS256);
        assert_eq!(verifiers.len(), 1);
        assert!(registry
            .verifiers_for(Some("key-1"), Algorithm::RS256)
            .iter()
            .all(|v| v.key_id() != Some("key-1")));
    }

    #[tokio::test]
    async fn unknown_key_id_falls_back_to_all_compatible_keys() {
        let registry =
            VerifierRegistry::from_config_with_fetcher(&config(), ScriptedFetcher::new([Ok(RSA_JWKS)]))
                .unwrap();
        registry.refresh().await.unwrap();

        let fallback = registry.verifiers_for(Some("unknown"), Algorithm::RS256);
        assert_eq!(fallback.len(), 1, "all cached keys are tried when no key id matches");

        let no_hint = registry.verifiers_for(None, Algorithm::RS256);
        assert_eq!(no_hint.len(), 1);

        assert!(registry.verifiers_for(None, Algorithm::ES256).is_empty());
    }

    #[tokio::test]
    async fn sources_are_consulted_in_priority_order() {
        let primary = "https://mp.example.org/oauth/token_key";
        let secondary = "https://other.example.org/jwks.json";

        let config = AuthConfig::builder("https://mp.example.org", "res_test")
            .add_public_key_endpoint(secondary)
            .build()
            .unwrap();

        let fetcher = Arc::new(MapFetcher {
            responses: HashMap::from([
                (primary.to_owned(), RSA_JWKS.to_owned()),
                (secondary.to_owned(), SECOND_RSA_JWKS.to_owned()),
            ]),
        });

        let registry = VerifierRegistry::from_config_with_fetcher(&config, fetcher).unwrap();
        registry.refresh().await.unwrap();

        assert_eq!(registry.key_count(), 2);
        let all = registry.verifiers_for(None, Algorithm::RS256);
        assert_eq!(all[0].key_id(), Some("key-1"), "primary source keys come first");
        assert_eq!(all[1].key_id(), Some("key-2"));
    }

    #[tokio::test]
    async fn partial_failure_is_not_an_error() {
        let primary = "https://mp.example.org/oauth/token_key";

        let config = AuthConfig::builder("https://mp.example.org", "res_test")
            .add_public_key_endpoint("https://down.example.org/jwks.json")
            .build()
            .unwrap();

        let fetcher = Arc::new(MapFetcher {
            responses: HashMap::from([(primary.to_owned(), RSA_JWKS.to_owned())]),
        });

        let registry = VerifierRegistry::from_config_with_fetcher(&config, fetcher).unwrap();
        registry.refresh().await.unwrap();
        assert_eq!(registry.key_count(), 1);
    }

    #[tokio::test]
    async fn static_sources_are_available_without_refresh() {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let pem = String::from_utf8(rsa.public_key_to_pem().unwrap()).unwrap();

        let config = AuthConfig::builder("", "res_test")
            .add_rsa_key(pem)
            .build()
            .unwrap();

        let registry = VerifierRegistry::from_config_with_fetcher(
            &config,
            ScriptedFetcher::new([]),
        )
        .unwrap();

        assert!(registry.has_any_keys());
        assert_eq!(registry.verifiers_for(None, Algorithm::RS256).len(), 1);

        // No remote sources, so a refresh trivially succeeds.
        registry.refresh().await.unwrap();
        assert_eq!(registry.key_count(), 1);
    }
}

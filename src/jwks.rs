//! Tolerant key set document handling
//!
//! A key set endpoint may serve keys this crate cannot use: encryption
//! keys, unsupported algorithms, or entirely foreign entries. Those are
//! skipped with a warning instead of failing the whole document, so one
//! odd key never blocks a rotation. Alongside standard JWK entries, the
//! ManagementPortal `token_key` endpoint serves entries that carry
//! PEM-encoded key text in a `value` field; both shapes are accepted.

use jsonwebtoken::jwk::Jwk;
use serde::Deserialize;

/// A key set document as served by a public key endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct KeySetDocument {
    #[serde(default)]
    pub(crate) keys: Vec<KeySetEntry>,
}

impl KeySetDocument {
    /// The number of entries in the document, usable or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the document holds no entries at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum KeySetEntry {
    Standard(Box<Jwk>),
    Pem(PemEntry),
    Unknown(serde_json::Value),
}

/// A key entry carrying PEM text in a `value` field
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PemEntry {
    pub(crate) kty: String,
    #[serde(default)]
    pub(crate) kid: Option<String>,
    #[serde(default)]
    pub(crate) alg: Option<String>,
    pub(crate) value: String,
}

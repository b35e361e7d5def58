//! Verification key material
//!
//! A [`TokenVerifier`] pairs one public key with the claim checks every
//! token verified by it must pass: the algorithm is pinned to the key,
//! the audience must include the configured resource name, `exp` is
//! required, and the issuer is enforced when one is configured.
//!
//! The expiry comparison has no leeway: a token is rejected as expired
//! only when its `exp` lies strictly before the evaluation instant, so a
//! token expiring exactly at that instant is still accepted.

use std::fmt;

use jsonwebtoken::{
    jwk::{self, Jwk},
    Algorithm, DecodingKey, TokenData, Validation,
};

use crate::{
    config::AuthConfig,
    error::ConfigurationError,
    jwks::{KeySetDocument, KeySetEntry, PemEntry},
    token::RawClaims,
};

/// A single verification algorithm
#[derive(Clone)]
pub struct TokenVerifier {
    key_id: Option<String>,
    algorithm: Algorithm,
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    fn new(
        key: DecodingKey,
        algorithm: Algorithm,
        key_id: Option<String>,
        audience: &str,
        issuer: Option<&str>,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_audience(&[audience]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        } else {
            validation.set_required_spec_claims(&["exp", "aud"]);
        }

        Self {
            key_id,
            algorithm,
            key,
            validation,
        }
    }

    /// Builds a verifier from an inline PEM-encoded RSA public key
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when the PEM text cannot be
    /// parsed. Inline keys are configuration, so this is fatal.
    pub fn from_rsa_pem(
        pem: &str,
        audience: &str,
        issuer: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|err| ConfigurationError::invalid_inline_key("RSA", err))?;
        Ok(Self::new(key, Algorithm::RS256, None, audience, issuer))
    }

    /// Builds a verifier from an inline PEM-encoded ECDSA public key
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when the PEM text cannot be
    /// parsed.
    pub fn from_ec_pem(
        pem: &str,
        audience: &str,
        issuer: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let key = DecodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|err| ConfigurationError::invalid_inline_key("ECDSA", err))?;
        Ok(Self::new(key, Algorithm::ES256, None, audience, issuer))
    }

    /// Builds a verifier from a standard JWK, skipping keys this crate
    /// cannot use
    #[must_use]
    pub fn from_jwk(jwk: &Jwk, audience: &str, issuer: Option<&str>) -> Option<Self> {
        if matches!(
            jwk.common.public_key_use,
            Some(jwk::PublicKeyUse::Encryption)
        ) {
            tracing::warn!(jwk.kid = ?jwk.common.key_id, "ignoring encryption-only JWK");
            return None;
        }

        let algorithm = jwk_algorithm(jwk)?;
        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(
                    jwk.kid = ?jwk.common.key_id,
                    error = %err,
                    "ignoring JWK with unusable key material"
                );
                return None;
            }
        };

        Some(Self::new(
            key,
            algorithm,
            jwk.common.key_id.clone(),
            audience,
            issuer,
        ))
    }

    /// The key id advertised for this key, if any
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// The signature algorithm this key verifies
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn decode(
        &self,
        token: &str,
    ) -> Result<TokenData<RawClaims>, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode(token, &self.key, &self.validation)
    }
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    if let Some(key_alg) = jwk.common.key_algorithm {
        let algorithm = match key_alg {
            jwk::KeyAlgorithm::RS256 => Algorithm::RS256,
            jwk::KeyAlgorithm::RS384 => Algorithm::RS384,
            jwk::KeyAlgorithm::RS512 => Algorithm::RS512,
            jwk::KeyAlgorithm::PS256 => Algorithm::PS256,
            jwk::KeyAlgorithm::PS384 => Algorithm::PS384,
            jwk::KeyAlgorithm::PS512 => Algorithm::PS512,
            jwk::KeyAlgorithm::ES256 => Algorithm::ES256,
            jwk::KeyAlgorithm::ES384 => Algorithm::ES384,
            jwk::KeyAlgorithm::HS256 => Algorithm::HS256,
            jwk::KeyAlgorithm::HS384 => Algorithm::HS384,
            jwk::KeyAlgorithm::HS512 => Algorithm::HS512,
            jwk::KeyAlgorithm::EdDSA => Algorithm::EdDSA,
            other => {
                tracing::warn!(
                    jwk.kid = ?jwk.common.key_id,
                    jwk.alg = ?other,
                    "ignoring JWK with unsupported algorithm"
                );
                return None;
            }
        };
        return Some(algorithm);
    }

    // No algorithm advertised; infer a default from the key family.
    match &jwk.algorithm {
        jwk::AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        jwk::AlgorithmParameters::EllipticCurve(params) => match params.curve {
            jwk::EllipticCurve::P256 => Some(Algorithm::ES256),
            jwk::EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => {
                tracing::warn!(jwk.kid = ?jwk.common.key_id, "ignoring JWK with unsupported curve");
                None
            }
        },
        jwk::AlgorithmParameters::OctetKeyPair(params)
            if params.curve == jwk::EllipticCurve::Ed25519 =>
        {
            Some(Algorithm::EdDSA)
        }
        _ => {
            tracing::warn!(jwk.kid = ?jwk.common.key_id, "ignoring JWK with no usable algorithm");
            None
        }
    }
}

/// Maps both JOSE and Java-style signature algorithm names
pub(crate) fn algorithm_from_name(name: &str) -> Option<Algorithm> {
    match name {
        "RS256" | "SHA256withRSA" => Some(Algorithm::RS256),
        "RS384" | "SHA384withRSA" => Some(Algorithm::RS384),
        "RS512" | "SHA512withRSA" => Some(Algorithm::RS512),
        "ES256" | "SHA256withECDSA" => Some(Algorithm::ES256),
        "ES384" | "SHA384withECDSA" => Some(Algorithm::ES384),
        _ => None,
    }
}

fn from_pem_entry(entry: &PemEntry, audience: &str, issuer: Option<&str>) -> Option<TokenVerifier> {
    let declared = entry.alg.as_deref().and_then(algorithm_from_name);

    let (key, algorithm) = match entry.kty.as_str() {
        "RSA" => (
            DecodingKey::from_rsa_pem(entry.value.as_bytes()),
            declared.unwrap_or(Algorithm::RS256),
        ),
        "EC" => (
            DecodingKey::from_ec_pem(entry.value.as_bytes()),
            declared.unwrap_or(Algorithm::ES256),
        ),
        other => {
            tracing::warn!(jwk.kty = other, "ignoring PEM key entry with unsupported key type");
            return None;
        }
    };

    match key {
        Ok(key) => Some(TokenVerifier::new(
            key,
            algorithm,
            entry.kid.clone(),
            audience,
            issuer,
        )),
        Err(err) => {
            tracing::warn!(
                jwk.kty = %entry.kty,
                error = %err,
                "ignoring PEM key entry that does not parse"
            );
            None
        }
    }
}

/// Turns a fetched key set document into verifiers, skipping entries
/// that cannot be used
pub(crate) fn verifiers_from_document(
    document: &KeySetDocument,
    audience: &str,
    issuer: Option<&str>,
) -> Vec<TokenVerifier> {
    document
        .keys
        .iter()
        .filter_map(|entry| match entry {
            KeySetEntry::Standard(jwk) => TokenVerifier::from_jwk(jwk, audience, issuer),
            KeySetEntry::Pem(pem) => from_pem_entry(pem, audience, issuer),
            KeySetEntry::Unknown(value) => {
                tracing::warn!(jwk = %value, "ignoring unknown key set entry");
                None
            }
        })
        .collect()
}

/// Parses every inline PEM key in the configuration
///
/// # Errors
///
/// Returns a [`ConfigurationError`] when any inline key fails to parse.
pub(crate) fn static_verifiers(
    config: &AuthConfig,
) -> Result<Vec<TokenVerifier>, ConfigurationError> {
    let mut verifiers = Vec::with_capacity(config.ecdsa_keys().len() + config.rsa_keys().len());
    for pem in config.ecdsa_keys() {
        verifiers.push(TokenVerifier::from_ec_pem(
            pem,
            config.resource_name(),
            config.issuer(),
        )?);
    }
    for pem in config.rsa_keys() {
        verifiers.push(TokenVerifier::from_rsa_pem(
            pem,
            config.resource_name(),
            config.issuer(),
        )?);
    }
    Ok(verifiers)
}

//! Token validation

use jsonwebtoken::errors::ErrorKind;

use crate::{
    error::TokenValidationError, registry::VerifierRegistry, token::RadarToken,
};

/// Validates compact bearer tokens against the registry's key material
#[derive(Clone, Debug)]
pub struct TokenValidator {
    registry: VerifierRegistry,
}

impl TokenValidator {
    /// Constructs a validator over the given registry
    #[must_use]
    pub fn new(registry: VerifierRegistry) -> Self {
        Self { registry }
    }

    /// The registry backing this validator
    #[must_use]
    pub fn registry(&self) -> &VerifierRegistry {
        &self.registry
    }

    /// Validates a compact token string and returns its claims
    ///
    /// The header is decoded only for its key-id and algorithm hints;
    /// nothing in the payload is trusted before a key has confirmed the
    /// signature, and claim checks (expiry, not-before, issuer,
    /// audience) run only after that confirmation. When the cached key
    /// set is older than the configured maximum age, a refresh runs
    /// first; a verifier cache miss triggers one more, rate-limited
    /// refresh before giving up.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenValidationError`] describing the first check
    /// that failed. A partially validated token is never returned.
    pub async fn validate(&self, token: &str) -> Result<RadarToken, TokenValidationError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(TokenValidationError::malformed)?;
        let algorithm = header.alg;
        let key_id = header.kid.as_deref();

        self.registry.ensure_fresh().await;

        let mut candidates = self.registry.verifiers_for(key_id, algorithm);
        if candidates.is_empty() {
            self.registry.refresh_after_miss().await;
            candidates = self.registry.verifiers_for(key_id, algorithm);
        }
        if candidates.is_empty() {
            return Err(TokenValidationError::NoVerifierAvailable);
        }

        let mut mismatch = None;
        for verifier in &candidates {
            match verifier.decode(token) {
                Ok(data) => return Ok(RadarToken::from_claims(data.claims)),
                Err(err) => match err.kind() {
                    // The signature did not match this key; another
                    // cached key may still verify the token.
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        mismatch = Some(err);
                    }
                    _ => return Err(map_rejection(err)),
                },
            }
        }

        Err(TokenValidationError::signature_invalid(mismatch))
    }
}

fn map_rejection(err: jsonwebtoken::errors::Error) -> TokenValidationError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenValidationError::Expired,
        ErrorKind::ImmatureSignature => TokenValidationError::NotYetValid,
        ErrorKind::InvalidIssuer => TokenValidationError::IssuerMismatch,
        ErrorKind::InvalidAudience => TokenValidationError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) => TokenValidationError::MissingClaim(claim.clone()),
        _ => TokenValidationError::malformed(err),
    }
}

//! Common errors

use std::error::Error as StdError;

use thiserror::Error;

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// The authorization layer is misconfigured and must not start
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No JWKS endpoint and no inline key material was supplied, so no
    /// token could ever be verified
    #[error("no token verification sources configured")]
    NoVerificationSources,

    /// An inline PEM key could not be parsed
    ///
    /// Inline keys are supplied synchronously through configuration, so
    /// a parse failure is fatal rather than recoverable.
    #[error("invalid inline {kind} public key")]
    InvalidInlineKey {
        /// The key family that failed to parse
        kind: &'static str,
        /// The underlying parse failure
        #[source]
        source: Source,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid_inline_key(kind: &'static str, source: impl Into<Source>) -> Self {
        Self::InvalidInlineKey {
            kind,
            source: source.into(),
        }
    }
}

/// A failure while retrieving a key set document from a remote source
#[derive(Debug, Error)]
pub enum JwksFetchError {
    /// The endpoint responded with a non-success status
    #[error("key endpoint returned HTTP status {status}")]
    UnexpectedStatus {
        /// The status code returned by the endpoint
        status: u16,
    },

    /// The endpoint could not be reached
    #[error("failed to reach the key endpoint")]
    Transport(#[source] Source),

    /// The response body was not a usable key set document
    #[error("failed to decode the key set document")]
    Decode(#[source] Source),

    /// The fetch did not complete within the configured timeout
    #[error("timed out while fetching the key set")]
    TimedOut,
}

impl JwksFetchError {
    /// Wraps a transport-level failure from a fetcher implementation
    pub fn transport(source: impl Into<Source>) -> Self {
        Self::Transport(source.into())
    }

    /// Wraps a decoding failure from a fetcher implementation
    pub fn decode(source: impl Into<Source>) -> Self {
        Self::Decode(source.into())
    }
}

/// Every remote key source failed to refresh
///
/// This is a soft failure: keys cached by an earlier refresh remain
/// valid and continue to verify tokens.
#[derive(Debug, Error)]
#[error("all {failed} remote key sources failed to refresh")]
pub struct RefreshError {
    pub(crate) failed: usize,
}

impl RefreshError {
    /// How many remote sources failed during this refresh
    #[must_use]
    pub fn failed_sources(&self) -> usize {
        self.failed
    }
}

/// A token was presented but could not be validated
///
/// Verifier failures are wrapped with their original cause retained for
/// logging; the underlying JWT library error type never reaches callers
/// directly.
#[derive(Debug, Error)]
pub enum TokenValidationError {
    /// The token could not be parsed into header, payload, and signature
    #[error("malformed token")]
    Malformed(#[source] Source),

    /// No cached key confirmed the token signature
    #[error("token signature could not be verified by any known key")]
    SignatureInvalid {
        /// The mismatch reported for the last key tried, if any
        #[source]
        cause: Option<Source>,
    },

    /// The token expired before the evaluation instant
    #[error("token has expired")]
    Expired,

    /// The token's `nbf` claim lies in the future
    #[error("token is not valid yet")]
    NotYetValid,

    /// The token was issued by an unexpected issuer
    #[error("token issuer is not accepted")]
    IssuerMismatch,

    /// The token audience does not include this resource
    #[error("token audience does not include this resource")]
    AudienceMismatch,

    /// A claim the verifier requires is absent
    #[error("token is missing the required `{0}` claim")]
    MissingClaim(String),

    /// No verification key has been cached yet, so the token cannot be
    /// checked at all
    #[error("no key is available to verify this token")]
    NoVerifierAvailable,
}

impl TokenValidationError {
    pub(crate) fn malformed(source: impl Into<Source>) -> Self {
        Self::Malformed(source.into())
    }

    pub(crate) fn signature_invalid(cause: Option<impl Into<Source>>) -> Self {
        Self::SignatureInvalid {
            cause: cause.map(Into::into),
        }
    }
}

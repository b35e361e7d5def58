//! The request authorization pipeline

use http::{request::Parts, Extensions, StatusCode};
use thiserror::Error;

use crate::{
    authz::{AuthorizationOracle, AuthorizationRequirement, EntityDetails, PermissionEvaluator, TokenOracle},
    error::{ConfigurationError, TokenValidationError},
    extract,
    token::RadarToken,
    validator::TokenValidator,
};

/// The request-context key under which the validated token is exposed
/// to downstream handlers
///
/// Within this crate the token is attached to [`http::Extensions`] by
/// type; adapters bridging to a string-keyed request context should use
/// this name.
pub const TOKEN_KEY: &str = "radar_token";

/// A failure while authenticating or authorizing a request
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no bearer token at all
    #[error("the token is missing from the request; no bearer token provided")]
    MissingToken,

    /// A token was presented but did not validate
    #[error("cannot verify token; it may have been rendered invalid")]
    InvalidToken(#[from] TokenValidationError),

    /// The token validated but the permission decision was negative
    #[error("the requested resource is forbidden")]
    Forbidden,
}

impl AuthError {
    /// The HTTP status this failure maps to: 401 for missing or invalid
    /// tokens, 403 for a negative permission decision
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// Binds token validation and permission evaluation into the single
/// entry point a framework adapter calls per intercepted request
#[derive(Clone, Debug)]
pub struct RequestAuthorizer<O = TokenOracle> {
    validator: TokenValidator,
    evaluator: PermissionEvaluator<O>,
}

impl RequestAuthorizer<TokenOracle> {
    /// Builds the full pipeline from configuration, using the default
    /// HTTP fetcher and the claims-only oracle
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when no key source is configured
    /// or an inline key does not parse.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn from_config(config: &crate::AuthConfig) -> Result<Self, ConfigurationError> {
        let registry = crate::VerifierRegistry::from_config(config)?;
        Ok(Self::new(
            TokenValidator::new(registry),
            PermissionEvaluator::new(),
        ))
    }
}

impl<O: AuthorizationOracle> RequestAuthorizer<O> {
    /// Composes a pipeline from its parts
    #[must_use]
    pub fn new(validator: TokenValidator, evaluator: PermissionEvaluator<O>) -> Self {
        Self {
            validator,
            evaluator,
        }
    }

    /// The validator backing this pipeline
    #[must_use]
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// The evaluator backing this pipeline
    #[must_use]
    pub fn evaluator(&self) -> &PermissionEvaluator<O> {
        &self.evaluator
    }

    /// Extracts and validates the request's bearer token
    ///
    /// Both failure modes are logged at warning level with the request
    /// path. A missing token and an invalid token are distinct errors so
    /// callers can report them differently.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] when no bearer token is
    /// present, or [`AuthError::InvalidToken`] when validation fails.
    pub async fn authenticate(&self, parts: &Parts) -> Result<RadarToken, AuthError> {
        let Some(raw) = extract::bearer_token(&parts.headers) else {
            tracing::warn!(
                path = %parts.uri.path(),
                "no token bearer header provided in the request"
            );
            return Err(AuthError::MissingToken);
        };

        self.validator.validate(raw).await.map_err(|err| {
            tracing::warn!(path = %parts.uri.path(), error = %err, "bearer token rejected");
            AuthError::from(err)
        })
    }

    /// Runs the full pipeline for one intercepted request
    ///
    /// A disabled requirement skips every check and yields `Ok(None)`.
    /// Otherwise the bearer token is extracted and validated, the
    /// requirement is evaluated against it, and on success the token is
    /// attached to the request extensions and returned so downstream
    /// handlers can read the caller identity without re-validating.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] or [`AuthError::InvalidToken`]
    /// for authentication failures (mapping to HTTP 401) and
    /// [`AuthError::Forbidden`] for a negative permission decision
    /// (mapping to HTTP 403).
    pub async fn authorize_request(
        &self,
        parts: &mut Parts,
        requirement: &AuthorizationRequirement,
        entity: &EntityDetails,
    ) -> Result<Option<RadarToken>, AuthError> {
        if !requirement.enabled() {
            return Ok(None);
        }

        tracing::debug!(path = %parts.uri.path(), "authorizing request");
        let token = self.authenticate(parts).await?;

        if self.evaluator.authorize(&token, requirement, entity) {
            tracing::debug!(path = %parts.uri.path(), "authorized; attaching token to the request");
            parts.extensions.insert(token.clone());
            Ok(Some(token))
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Reads a previously attached token back out of request extensions
#[must_use]
pub fn token_from_extensions(extensions: &Extensions) -> Option<&RadarToken> {
    extensions.get::<RadarToken>()
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Arc,
        time::{SystemTime, UNIX_EPOCH},
    };

    use async_trait::async_trait;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::*;
    use crate::{
        authz::{Entity, Operation, Permission, PermissionOn},
        error::JwksFetchError,
        jwks::KeySetDocument,
        source::JwksFetcher,
        AuthConfig, VerifierRegistry,
    };

    #[derive(Debug, Default)]
    struct NoFetcher;

    #[async_trait]
    impl JwksFetcher for NoFetcher {
        async fn fetch(&self, _url: &str) -> Result<KeySetDocument, JwksFetchError> {
            Err(JwksFetchError::UnexpectedStatus { status: 404 })
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn authorizer() -> (RequestAuthorizer, EncodingKey) {
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let signing = EncodingKey::from_rsa_pem(&rsa.private_key_to_pem().unwrap()).unwrap();
        let public_pem = String::from_utf8(rsa.public_key_to_pem().unwrap()).unwrap();

        let config = AuthConfig::builder("", "res_test")
            .add_rsa_key(public_pem)
            .build()
            .unwrap();
        let registry =
            VerifierRegistry::from_config_with_fetcher(&config, Arc::new(NoFetcher)).unwrap();

        (
            RequestAuthorizer::new(TokenValidator::new(registry), PermissionEvaluator::new()),
            signing,
        )
    }

    fn token(signing: &EncodingKey) -> String {
        let claims = json!({
            "sub": "sub-1",
            "aud": ["res_test"],
            "scope": "MEASUREMENT.READ",
            "roles": ["radar:ROLE_PARTICIPANT"],
            "grant_type": "password",
            "exp": now() + 300,
        });
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, signing).unwrap()
    }

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().uri("/projects/radar/subjects");
        if let Some(value) = authorization {
            builder = builder.header(http::header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn requirement() -> AuthorizationRequirement {
        AuthorizationRequirement::new(Permission::new(Entity::Measurement, Operation::Read))
            .on(PermissionOn::Project)
            .with_role("ROLE_PARTICIPANT")
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (authorizer, _) = authorizer();
        let mut parts = parts(None);

        let err = authorizer
            .authorize_request(&mut parts, &requirement(), &EntityDetails::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::MissingToken));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let (authorizer, _) = authorizer();
        let mut parts = parts(Some("Bearer not.a.token"));

        let err = authorizer
            .authorize_request(&mut parts, &requirement(), &EntityDetails::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidToken(_)));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn disabled_requirement_skips_authorization() {
        let (authorizer, _) = authorizer();
        let mut parts = parts(None);

        let granted = authorizer
            .authorize_request(&mut parts, &requirement().disabled(), &EntityDetails::new())
            .await
            .unwrap();

        assert!(granted.is_none());
        assert!(token_from_extensions(&parts.extensions).is_none());
    }

    #[tokio::test]
    async fn authorized_request_attaches_the_token() {
        let (authorizer, signing) = authorizer();
        let bearer = format!("Bearer {}", token(&signing));
        let mut parts = parts(Some(&bearer));
        let entity = EntityDetails::new().with_project("radar");

        let granted = authorizer
            .authorize_request(&mut parts, &requirement(), &entity)
            .await
            .unwrap()
            .expect("requirement is enabled");

        assert_eq!(granted.subject(), Some("sub-1"));
        let attached = token_from_extensions(&parts.extensions).unwrap();
        assert_eq!(attached, &granted);
    }

    #[tokio::test]
    async fn denied_request_is_forbidden() {
        let (authorizer, signing) = authorizer();
        let bearer = format!("Bearer {}", token(&signing));
        let mut parts = parts(Some(&bearer));
        // The token holds no role on this project.
        let entity = EntityDetails::new().with_project("other");

        let err = authorizer
            .authorize_request(&mut parts, &requirement(), &entity)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Forbidden));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(token_from_extensions(&parts.extensions).is_none());
    }

    #[tokio::test]
    async fn authenticate_returns_the_validated_claims() {
        let (authorizer, signing) = authorizer();
        let bearer = format!("Bearer {}", token(&signing));
        let parts = parts(Some(&bearer));

        let token = authorizer.authenticate(&parts).await.unwrap();
        assert_eq!(token.grant_type(), Some("password"));
        assert!(token.has_scope("MEASUREMENT.READ"));
    }
}

//! The validated token model

use std::collections::HashSet;

use serde::Deserialize;

/// A role held by the token bearer
///
/// Roles are claimed as `referent:AUTHORITY` pairs, where the referent
/// is typically a project name. A role without a referent is a global
/// authority such as `ROLE_SYS_ADMIN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAuthority {
    referent: Option<String>,
    authority: String,
}

impl RoleAuthority {
    /// Constructs a role, optionally anchored to a referent
    pub fn new(referent: Option<impl Into<String>>, authority: impl Into<String>) -> Self {
        Self {
            referent: referent.map(Into::into),
            authority: authority.into(),
        }
    }

    /// The entity this role is anchored to, typically a project name
    #[must_use]
    pub fn referent(&self) -> Option<&str> {
        self.referent.as_deref()
    }

    /// The authority name, e.g. `ROLE_PARTICIPANT`
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }
}

/// The claims of a validated access token
///
/// Instances are produced only by token validation and are read-only
/// for the remainder of the request. They are never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RadarToken {
    subject: Option<String>,
    issuer: Option<String>,
    scopes: HashSet<String>,
    audience: HashSet<String>,
    grant_type: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    roles: Vec<RoleAuthority>,
    issued_at: Option<u64>,
    expires_at: Option<u64>,
}

impl RadarToken {
    pub(crate) fn from_claims(claims: RawClaims) -> Self {
        let mut roles: Vec<RoleAuthority> =
            claims.roles.iter().map(|entry| parse_role(entry)).collect();
        roles.extend(
            claims
                .authorities
                .into_iter()
                .map(|authority| RoleAuthority::new(None::<String>, authority)),
        );

        Self {
            subject: claims.sub,
            issuer: claims.iss,
            scopes: claims
                .scope
                .map(StringOrSet::into_scopes)
                .unwrap_or_default(),
            audience: claims.aud.map(StringOrSet::into_values).unwrap_or_default(),
            grant_type: claims.grant_type,
            client_id: claims.client_id,
            username: claims.user_name,
            roles,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }

    /// The `sub` claim
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The `iss` claim
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// The set of OAuth2 scopes granted to this token
    #[must_use]
    pub fn scopes(&self) -> &HashSet<String> {
        &self.scopes
    }

    /// Whether the token holds the given scope
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// The audiences this token was issued for
    #[must_use]
    pub fn audience(&self) -> &HashSet<String> {
        &self.audience
    }

    /// The OAuth2 grant type the token was obtained through
    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        self.grant_type.as_deref()
    }

    /// The OAuth2 client the token was issued to
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The login name of the user, when the token was issued to one
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The roles claimed by this token, in claim order
    #[must_use]
    pub fn roles(&self) -> &[RoleAuthority] {
        &self.roles
    }

    /// The `iat` claim as seconds since the Unix epoch
    #[must_use]
    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    /// The `exp` claim as seconds since the Unix epoch
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }
}

fn parse_role(entry: &str) -> RoleAuthority {
    match entry.split_once(':') {
        Some((referent, authority)) if !referent.is_empty() && !authority.is_empty() => {
            RoleAuthority::new(Some(referent), authority)
        }
        _ => RoleAuthority::new(None::<String>, entry),
    }
}

/// The claim payload as it appears on the wire, deserialized only after
/// the signature has been confirmed
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub(crate) sub: Option<String>,
    #[serde(default)]
    pub(crate) iss: Option<String>,
    #[serde(default)]
    pub(crate) aud: Option<StringOrSet>,
    #[serde(default)]
    pub(crate) scope: Option<StringOrSet>,
    #[serde(default)]
    pub(crate) roles: Vec<String>,
    #[serde(default)]
    pub(crate) authorities: Vec<String>,
    #[serde(default)]
    pub(crate) grant_type: Option<String>,
    #[serde(default)]
    pub(crate) client_id: Option<String>,
    #[serde(default)]
    pub(crate) user_name: Option<String>,
    #[serde(default)]
    pub(crate) iat: Option<u64>,
    #[serde(default)]
    pub(crate) exp: Option<u64>,
}

/// Claims like `aud` and `scope` appear either as a single string or as
/// an array of strings depending on the token issuer
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrSet {
    One(String),
    Many(Vec<String>),
}

impl StringOrSet {
    /// A scope string holds space-delimited scope tokens
    fn into_scopes(self) -> HashSet<String> {
        match self {
            Self::One(value) => value.split_whitespace().map(str::to_owned).collect(),
            Self::Many(values) => values.into_iter().collect(),
        }
    }

    /// A plain string claim is a single value, never split
    fn into_values(self) -> HashSet<String> {
        match self {
            Self::One(value) => [value].into_iter().collect(),
            Self::Many(values) => values.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(claims: RawClaims) -> RadarToken {
        RadarToken::from_claims(claims)
    }

    #[test]
    fn splits_scope_strings_on_whitespace() {
        let token = token(RawClaims {
            scope: Some(StringOrSet::One("MEASUREMENT.READ SUBJECT.READ".into())),
            ..RawClaims::default()
        });

        assert!(token.has_scope("MEASUREMENT.READ"));
        assert!(token.has_scope("SUBJECT.READ"));
        assert_eq!(token.scopes().len(), 2);
    }

    #[test]
    fn accepts_scope_arrays() {
        let token = token(RawClaims {
            scope: Some(StringOrSet::Many(vec!["MEASUREMENT.CREATE".into()])),
            ..RawClaims::default()
        });

        assert!(token.has_scope("MEASUREMENT.CREATE"));
    }

    #[test]
    fn single_audience_is_not_split() {
        let token = token(RawClaims {
            aud: Some(StringOrSet::One("res_Rest Source".into())),
            ..RawClaims::default()
        });

        assert!(token.audience().contains("res_Rest Source"));
        assert_eq!(token.audience().len(), 1);
    }

    #[test]
    fn parses_referent_roles() {
        let token = token(RawClaims {
            roles: vec!["radar:ROLE_PARTICIPANT".into(), "ROLE_SYS_ADMIN".into()],
            ..RawClaims::default()
        });

        assert_eq!(
            token.roles(),
            &[
                RoleAuthority::new(Some("radar"), "ROLE_PARTICIPANT"),
                RoleAuthority::new(None::<String>, "ROLE_SYS_ADMIN"),
            ]
        );
    }

    #[test]
    fn merges_legacy_authorities_as_global_roles() {
        let token = token(RawClaims {
            roles: vec!["radar:ROLE_ADMIN".into()],
            authorities: vec!["ROLE_SYS_ADMIN".into()],
            ..RawClaims::default()
        });

        assert_eq!(token.roles().len(), 2);
        assert_eq!(token.roles()[1].authority(), "ROLE_SYS_ADMIN");
        assert_eq!(token.roles()[1].referent(), None);
    }

    #[test]
    fn role_with_empty_referent_is_global() {
        let token = token(RawClaims {
            roles: vec![":ROLE_ODD".into()],
            ..RawClaims::default()
        });

        assert_eq!(token.roles()[0].referent(), None);
        assert_eq!(token.roles()[0].authority(), ":ROLE_ODD");
    }

    #[test]
    fn deserializes_wire_claims() {
        let claims: RawClaims = serde_json::from_str(
            r#"{
                "sub": "sub-1",
                "aud": ["res_ManagementPortal"],
                "scope": "MEASUREMENT.READ",
                "roles": ["radar:ROLE_PARTICIPANT"],
                "grant_type": "password",
                "client_id": "aRMT",
                "iat": 1700000000,
                "exp": 1700003600,
                "unknown_claim": {"nested": true}
            }"#,
        )
        .unwrap();

        let token = RadarToken::from_claims(claims);
        assert_eq!(token.subject(), Some("sub-1"));
        assert_eq!(token.grant_type(), Some("password"));
        assert_eq!(token.client_id(), Some("aRMT"));
        assert_eq!(token.issued_at(), Some(1_700_000_000));
        assert_eq!(token.expires_at(), Some(1_700_003_600));
    }
}

//! Bearer token extraction from request headers

use http::header::{HeaderMap, AUTHORIZATION, COOKIE};

const BEARER: &str = "Bearer ";
const TOKEN_COOKIE: &str = "authorizationBearer";

/// Pulls the raw bearer token out of the request headers
///
/// The `Authorization` header is consulted first; a value with a
/// case-insensitive `Bearer ` prefix yields the trimmed remainder. When
/// that fails, the request cookies are scanned for one named
/// `authorizationBearer`.
///
/// Returns `None` when no token is present by either mechanism. Absence
/// of a token is not an error here: callers report it separately from an
/// invalid token.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    from_authorization_header(headers).or_else(|| from_cookie(headers))
}

fn from_authorization_header(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let prefix = value.get(..BEARER.len())?;
    if prefix.eq_ignore_ascii_case(BEARER) {
        Some(value[BEARER.len()..].trim())
    } else {
        None
    }
}

fn from_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name.trim() == TOKEN_COOKIE).then(|| value.trim())
        })
}

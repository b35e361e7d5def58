//! The grant-check boundary

use crate::token::RadarToken;

use super::{EntityDetails, Permission};

/// Decides whether a token actually holds a permission for the entity
/// in question
///
/// The evaluator enforces which identifiers are mandatory and resolves
/// fallbacks before calling in here; an oracle only answers the grant
/// question. The contract is synchronous: implementations backed by a
/// remote policy service should resolve their data ahead of time rather
/// than blocking inside the check.
pub trait AuthorizationOracle: Send + Sync {
    /// Whether `token` holds `permission` for `entity`
    fn has_permission(
        &self,
        token: &RadarToken,
        permission: Permission,
        entity: &EntityDetails,
    ) -> bool;
}

/// Grant checks derived purely from the token's own claims
///
/// A permission is granted when the token's scopes contain the
/// permission's implied scope and, when the check names a project, some
/// role ties the bearer to that project. Roles without a referent are
/// global authorities and qualify for any project.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenOracle;

impl AuthorizationOracle for TokenOracle {
    fn has_permission(
        &self,
        token: &RadarToken,
        permission: Permission,
        entity: &EntityDetails,
    ) -> bool {
        if !token.has_scope(&permission.scope()) {
            tracing::debug!(
                permission = %permission,
                "token scopes do not include the permission scope"
            );
            return false;
        }

        match entity.project() {
            Some(project) => token
                .roles()
                .iter()
                .any(|role| role.referent().is_none() || role.referent() == Some(project)),
            None => true,
        }
    }
}

//! The permission decision

use crate::token::{RadarToken, RoleAuthority};

use super::{
    AuthorizationOracle, AuthorizationRequirement, EntityDetails, Permission, PermissionOn,
    TokenOracle,
};

/// Evaluates [`AuthorizationRequirement`]s against validated tokens
///
/// The evaluation is pure with respect to the token: nothing here
/// mutates state or performs I/O, so callers may run it concurrently
/// without coordination. Denials caused by missing identifiers fail
/// closed and are logged at warning level so they can be diagnosed
/// without re-deriving the request context.
#[derive(Clone, Debug, Default)]
pub struct PermissionEvaluator<O = TokenOracle> {
    oracle: O,
}

impl PermissionEvaluator<TokenOracle> {
    /// An evaluator backed by the claims-only [`TokenOracle`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            oracle: TokenOracle,
        }
    }
}

impl<O: AuthorizationOracle> PermissionEvaluator<O> {
    /// An evaluator backed by a caller-supplied oracle
    #[must_use]
    pub fn with_oracle(oracle: O) -> Self {
        Self { oracle }
    }

    /// The oracle backing this evaluator
    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The composite decision
    ///
    /// Permission, role, scopes, authorities, audiences, and grant type
    /// are all required to pass. The conjunction short-circuits, which
    /// is safe because none of the checks has side effects.
    #[must_use]
    pub fn authorize(
        &self,
        token: &RadarToken,
        requirement: &AuthorizationRequirement,
        entity: &EntityDetails,
    ) -> bool {
        self.has_permission(
            token,
            requirement.permission(),
            requirement.permission_on(),
            entity,
        ) && self.has_role(token, entity.project(), requirement.role())
            && self.has_scopes(token, requirement.scopes())
            && self.has_authorities(token, requirement.authorities())
            && self.has_audiences(token, requirement.audiences())
            && self.has_grant_types(token, requirement.grant_types())
    }

    /// Checks the anchored permission, dispatching on `permission_on`
    ///
    /// Identifiers the request did not supply fall back to what the
    /// token itself claims: the subject defaults to the token subject
    /// and the project to the referent of the token's first role. A
    /// check whose mandatory identifiers are still missing after those
    /// fallbacks is denied.
    #[must_use]
    pub fn has_permission(
        &self,
        token: &RadarToken,
        permission: Permission,
        permission_on: PermissionOn,
        entity: &EntityDetails,
    ) -> bool {
        let subject = entity
            .subject()
            .or_else(|| entity.user())
            .or_else(|| token.subject());
        let user = entity.user().or(subject);
        let project = entity
            .project()
            .or_else(|| token.roles().iter().find_map(RoleAuthority::referent));
        let source = entity.source();

        match permission_on {
            PermissionOn::Project => {
                let Some(project) = project else {
                    tracing::warn!(
                        %permission,
                        "the project must be specified when checking permissions on a project"
                    );
                    return false;
                };
                let mut details = EntityDetails::new().with_project(project);
                if let Some(subject) = subject {
                    details = details.with_subject(subject);
                }
                self.oracle.has_permission(token, permission, &details)
            }
            PermissionOn::Subject => {
                let (Some(project), Some(subject)) = (project, subject) else {
                    tracing::warn!(
                        %permission,
                        "the project and subject must be specified when checking permissions on a subject"
                    );
                    return false;
                };
                self.oracle.has_permission(
                    token,
                    permission,
                    &EntityDetails::new().with_project(project).with_subject(subject),
                )
            }
            PermissionOn::Source => {
                let (Some(project), Some(user), Some(source)) = (project, user, source) else {
                    tracing::warn!(
                        %permission,
                        "the project, user and source must be specified when checking permissions on a source"
                    );
                    return false;
                };
                // Source checks hand the oracle all three identifiers.
                self.oracle.has_permission(
                    token,
                    permission,
                    &EntityDetails::new()
                        .with_project(project)
                        .with_user(user)
                        .with_source(source),
                )
            }
            PermissionOn::Default => {
                let mut details = EntityDetails::new();
                if let Some(organization) = entity.organization() {
                    details = details.with_organization(organization);
                }
                if let Some(project) = project {
                    details = details.with_project(project);
                }
                if let Some(subject) = subject {
                    details = details.with_subject(subject);
                }
                if let Some(source) = source {
                    details = details.with_source(source);
                }
                if let Some(user) = entity.user() {
                    details = details.with_user(user);
                }
                self.oracle.has_permission(token, permission, &details)
            }
        }
    }

    /// Whether the token holds the required role on the project
    ///
    /// No required role passes vacuously. Otherwise the project must be
    /// supplied, and some token role must match both the project
    /// referent and the authority name.
    #[must_use]
    pub fn has_role(
        &self,
        token: &RadarToken,
        project: Option<&str>,
        role: Option<&str>,
    ) -> bool {
        let Some(role) = role.filter(|role| !role.trim().is_empty()) else {
            return true;
        };
        let Some(project) = project.filter(|project| !project.trim().is_empty()) else {
            tracing::warn!(role, "a project must be specified when checking a role");
            return false;
        };

        token
            .roles()
            .iter()
            .filter(|r| r.referent() == Some(project))
            .any(|r| r.authority() == role)
    }

    /// Whether every required scope is present in the token
    #[must_use]
    pub fn has_scopes(&self, token: &RadarToken, scopes: &[String]) -> bool {
        scopes.iter().all(|scope| token.has_scope(scope))
    }

    /// Whether every required authority name appears among the token's
    /// role authorities
    #[must_use]
    pub fn has_authorities(&self, token: &RadarToken, authorities: &[String]) -> bool {
        authorities
            .iter()
            .all(|required| token.roles().iter().any(|r| r.authority() == required))
    }

    /// Whether every required audience is present in the token
    #[must_use]
    pub fn has_audiences(&self, token: &RadarToken, audiences: &[String]) -> bool {
        audiences
            .iter()
            .all(|audience| token.audience().contains(audience))
    }

    /// Whether the token's grant type is acceptable
    ///
    /// An empty requirement accepts any grant type; otherwise the
    /// token's single grant type must be a member of the required set.
    #[must_use]
    pub fn has_grant_types(&self, token: &RadarToken, grant_types: &[String]) -> bool {
        if grant_types.is_empty() {
            return true;
        }
        token
            .grant_type()
            .is_some_and(|grant_type| grant_types.iter().any(|t| t == grant_type))
    }
}

//! Declarative permission evaluation over validated tokens
//!
//! A protected operation declares an [`AuthorizationRequirement`]; the
//! framework adapter extracts the request's [`EntityDetails`]; and the
//! [`PermissionEvaluator`] decides allow or deny from those two values
//! plus the validated token. Nothing here inspects handler signatures
//! or performs I/O.

mod entity;
mod evaluator;
mod oracle;
mod permission;

pub use entity::{
    EntityDetails, ORGANIZATION_ID_PARAMETER, PROJECT_ID_PARAMETER, SOURCE_ID_PARAMETER,
    SUBJECT_ID_PARAMETER, USER_ID_PARAMETER,
};
pub use evaluator::PermissionEvaluator;
pub use oracle::{AuthorizationOracle, TokenOracle};
pub use permission::{Entity, Operation, Permission};

/// The scope level a permission check is anchored to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PermissionOn {
    /// The check is anchored to a project; the project identifier is
    /// mandatory
    Project,
    /// The check is anchored to a subject within a project; both
    /// identifiers are mandatory
    Subject,
    /// The check is anchored to a source registered to a user within a
    /// project; all three identifiers are mandatory
    Source,
    /// No mandatory anchor: the check runs against whatever identifiers
    /// the request supplied
    #[default]
    Default,
}

/// The declarative requirement attached to a protected operation
///
/// Construction applies the declaration defaults once: the requirement
/// is enabled, anchored to [`PermissionOn::Default`], and carries no
/// role, scope, authority, audience, or grant-type constraints until
/// they are added explicitly.
#[derive(Clone, Debug)]
#[must_use]
pub struct AuthorizationRequirement {
    enabled: bool,
    permission: Permission,
    permission_on: PermissionOn,
    role: Option<String>,
    scopes: Vec<String>,
    authorities: Vec<String>,
    audiences: Vec<String>,
    grant_types: Vec<String>,
}

impl AuthorizationRequirement {
    /// Starts a requirement for the given permission
    pub fn new(permission: Permission) -> Self {
        Self {
            enabled: true,
            permission,
            permission_on: PermissionOn::Default,
            role: None,
            scopes: Vec::new(),
            authorities: Vec::new(),
            audiences: Vec::new(),
            grant_types: Vec::new(),
        }
    }

    /// Marks the requirement as disabled; a disabled requirement skips
    /// authorization entirely
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Anchors the permission check to the given scope level
    pub fn on(mut self, permission_on: PermissionOn) -> Self {
        self.permission_on = permission_on;
        self
    }

    /// Requires the token to hold this role on the request's project
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Requires the token to hold this scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Requires the token to hold a role with this authority name
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    /// Requires the token audience to include this value
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    /// Restricts which grant types the token may have been obtained
    /// through
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_types.push(grant_type.into());
        self
    }

    /// Whether this requirement is enforced at all
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The permission to check
    #[must_use]
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// The scope level the permission check is anchored to
    #[must_use]
    pub fn permission_on(&self) -> PermissionOn {
        self.permission_on
    }

    /// The required role, if any
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// The required scopes
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The required authority names
    #[must_use]
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    /// The required audiences
    #[must_use]
    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    /// The acceptable grant types; empty means any
    #[must_use]
    pub fn grant_types(&self) -> &[String] {
        &self.grant_types
    }
}

//! The permission matrix

use std::fmt;

/// An entity class over which permissions are granted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Entity {
    Measurement,
    Project,
    Subject,
    Source,
    SourceType,
    SourceData,
    Organization,
    User,
    Role,
    OauthClients,
    Audit,
    Authority,
}

impl Entity {
    /// The canonical upper-case name used in scope strings
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Measurement => "MEASUREMENT",
            Self::Project => "PROJECT",
            Self::Subject => "SUBJECT",
            Self::Source => "SOURCE",
            Self::SourceType => "SOURCETYPE",
            Self::SourceData => "SOURCEDATA",
            Self::Organization => "ORGANIZATION",
            Self::User => "USER",
            Self::Role => "ROLE",
            Self::OauthClients => "OAUTHCLIENTS",
            Self::Audit => "AUDIT",
            Self::Authority => "AUTHORITY",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation on an entity class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// The canonical upper-case name used in scope strings
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission: one operation on one entity class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Permission {
    entity: Entity,
    operation: Operation,
}

impl Permission {
    /// Constructs the permission for `operation` on `entity`
    #[must_use]
    pub const fn new(entity: Entity, operation: Operation) -> Self {
        Self { entity, operation }
    }

    /// The entity class this permission covers
    #[must_use]
    pub fn entity(self) -> Entity {
        self.entity
    }

    /// The operation this permission covers
    #[must_use]
    pub fn operation(self) -> Operation {
        self.operation
    }

    /// The OAuth2 scope implied by this permission, e.g.
    /// `MEASUREMENT.READ`
    #[must_use]
    pub fn scope(self) -> String {
        format!("{}.{}", self.entity, self.operation)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.operation)
    }
}

//! Request-derived entity identifiers

/// The default handler parameter name for organization identifiers
pub const ORGANIZATION_ID_PARAMETER: &str = "organizationId";
/// The default handler parameter name for project identifiers
pub const PROJECT_ID_PARAMETER: &str = "projectId";
/// The default handler parameter name for subject identifiers
pub const SUBJECT_ID_PARAMETER: &str = "subjectId";
/// The default handler parameter name for source identifiers
pub const SOURCE_ID_PARAMETER: &str = "sourceId";
/// The default handler parameter name for user identifiers
pub const USER_ID_PARAMETER: &str = "userId";

/// The identifiers one intercepted call refers to
///
/// Framework adapters build this from their own routing mechanism, for
/// instance by matching path or handler parameter names against the
/// `*_ID_PARAMETER` constants in this module. Every field is optional;
/// the permission check decides which ones are mandatory for a given
/// [`PermissionOn`](super::PermissionOn) anchor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct EntityDetails {
    organization: Option<String>,
    project: Option<String>,
    subject: Option<String>,
    source: Option<String>,
    user: Option<String>,
}

impl EntityDetails {
    /// Details with no identifiers set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the organization identifier
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Sets the project identifier
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the subject identifier
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the source identifier
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the user identifier
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// The organization identifier, if supplied
    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    /// The project identifier, if supplied
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// The subject identifier, if supplied
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The source identifier, if supplied
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The user identifier, if supplied
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

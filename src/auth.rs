use crate::error::{Result, SprintboardError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identifier of a user, as issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an organization, as issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Membership role within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "org:admin")]
    Admin,
    #[serde(rename = "org:member")]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "org:admin",
            Self::Member => "org:member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SprintboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "org:admin" | "admin" => Ok(Self::Admin),
            "org:member" | "member" | "basic_member" | "org:basic_member" => Ok(Self::Member),
            _ => Err(SprintboardError::Validation(format!("Unknown role: {}", s))),
        }
    }
}

/// Capability describing the acting principal.
///
/// Handed in by the identity provider; nothing in the crate looks up the
/// acting user on its own. Tests drive it with a plain [`Principal`].
pub trait AuthContext: Send + Sync {
    /// The authenticated user
    fn user_id(&self) -> &UserId;

    /// The organization currently selected by the user, if any
    fn organization_id(&self) -> Option<&OrganizationId>;

    /// Whether the principal holds `role` in the selected organization
    fn has_role(&self, role: Role) -> bool;

    fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Returns the selected organization or fails with `Unauthorized`
    fn require_organization(&self) -> Result<&OrganizationId> {
        self.organization_id().ok_or_else(|| {
            SprintboardError::Unauthorized("No organization selected".to_string())
        })
    }

    /// Fails with `Unauthorized` unless the principal is an admin
    fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id(), "admin role required");
            Err(SprintboardError::Unauthorized(
                "User is not an admin of the organization".to_string(),
            ))
        }
    }
}

/// A resolved `(user, organization, role)` triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub organization_id: Option<OrganizationId>,
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, organization_id: OrganizationId, role: Role) -> Self {
        Self {
            user_id,
            organization_id: Some(organization_id),
            role: Some(role),
        }
    }

    pub fn admin(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self::new(
            UserId::new(user_id),
            OrganizationId::new(organization_id),
            Role::Admin,
        )
    }

    pub fn member(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self::new(
            UserId::new(user_id),
            OrganizationId::new(organization_id),
            Role::Member,
        )
    }

    /// A signed-in user without a selected organization
    pub fn without_organization(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            organization_id: None,
            role: None,
        }
    }
}

impl AuthContext for Principal {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn organization_id(&self) -> Option<&OrganizationId> {
        self.organization_id.as_ref()
    }

    fn has_role(&self, role: Role) -> bool {
        self.organization_id.is_some() && self.role == Some(role)
    }
}

use crate::{
    auth::OrganizationId,
    domain::sprint::Sprint,
    error::{Result, SprintboardError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

uuid_id!(
    /// Unique identifier for a project
    ProjectId,
    "project"
);

/// A project owned by an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub const MAX_NAME_LEN: usize = 100;
    pub const MIN_KEY_LEN: usize = 2;
    pub const MAX_KEY_LEN: usize = 10;
    pub const MAX_DESCRIPTION_LEN: usize = 500;

    /// Creates a validated project. The key is stored upper-cased.
    pub fn new(
        name: String,
        key: String,
        description: Option<String>,
        organization_id: OrganizationId,
    ) -> Result<Self> {
        let name = name.trim().to_string();
        let key = key.trim().to_uppercase();
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        validate_name(&name)?;
        validate_key(&key)?;
        if let Some(description) = &description {
            if description.chars().count() > Self::MAX_DESCRIPTION_LEN {
                return Err(SprintboardError::Validation(format!(
                    "Description must be {} characters or less",
                    Self::MAX_DESCRIPTION_LEN
                )));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: ProjectId::new(),
            name,
            key,
            description,
            organization_id,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn belongs_to(&self, organization_id: &OrganizationId) -> bool {
        &self.organization_id == organization_id
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SprintboardError::Validation(
            "Project name is required".to_string(),
        ));
    }
    if name.chars().count() > Project::MAX_NAME_LEN {
        return Err(SprintboardError::Validation(format!(
            "Project name must be {} characters or less",
            Project::MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    let len = key.chars().count();
    if len < Project::MIN_KEY_LEN {
        return Err(SprintboardError::Validation(format!(
            "Project key must be at least {} characters",
            Project::MIN_KEY_LEN
        )));
    }
    if len > Project::MAX_KEY_LEN {
        return Err(SprintboardError::Validation(format!(
            "Project key must be {} characters or less",
            Project::MAX_KEY_LEN
        )));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(SprintboardError::Validation(
            "Project key must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

/// A project together with its sprints, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectWithSprints {
    #[serde(flatten)]
    pub project: Project,
    pub sprints: Vec<Sprint>,
}

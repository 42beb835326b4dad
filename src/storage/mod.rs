use crate::{
    auth::OrganizationId,
    domain::{
        Issue, IssueId, IssueOrderUpdate, IssueStatus, IssueUpdate, Project, ProjectId, Sprint,
        SprintId, SprintUpdate,
    },
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Storage trait for persisting projects, sprints and issues
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the storage has been initialized
    async fn is_initialized(&self) -> bool;

    /// Saves a project, replacing any previous version
    async fn save_project(&self, project: &Project) -> Result<()>;

    /// Loads a project by ID
    async fn load_project(&self, id: &ProjectId) -> Result<Project>;

    /// Lists an organization's projects, newest first
    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<Project>>;

    /// Finds a project by its key, case-insensitively
    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>>;

    /// Deletes a project together with its sprints and issues
    async fn delete_project(&self, id: &ProjectId) -> Result<()>;

    /// Saves a sprint, replacing any previous version
    async fn save_sprint(&self, sprint: &Sprint) -> Result<()>;

    /// Loads a sprint by ID
    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint>;

    /// Lists a project's sprints, newest first
    async fn list_sprints(&self, project_id: &ProjectId) -> Result<Vec<Sprint>>;

    /// Applies field changes to a sprint and returns the stored result
    async fn update_sprint(&self, id: &SprintId, update: &SprintUpdate) -> Result<Sprint>;

    /// Stores a new issue
    async fn create_issue(&self, issue: &Issue) -> Result<()>;

    /// Loads an issue by ID
    async fn load_issue(&self, id: &IssueId) -> Result<Issue>;

    /// Applies field changes to an issue and returns the stored result
    async fn update_issue(&self, id: &IssueId, update: &IssueUpdate) -> Result<Issue>;

    /// Deletes an issue
    async fn delete_issue(&self, id: &IssueId) -> Result<()>;

    /// Lists a sprint's issues sorted by status, then order
    async fn list_issues_for_sprint(&self, sprint_id: &SprintId) -> Result<Vec<Issue>>;

    /// Lists every issue of a project
    async fn list_issues_for_project(&self, project_id: &ProjectId) -> Result<Vec<Issue>>;

    /// Lists one lane of a sprint, sorted by order
    async fn find_issues_by_sprint_and_status(
        &self,
        sprint_id: &SprintId,
        status: IssueStatus,
    ) -> Result<Vec<Issue>>;

    /// Writes status and order (and priority, where given) for every listed
    /// issue.
    ///
    /// All-or-nothing: if any row cannot be written, none of them are.
    async fn update_issue_orders(&self, updates: &[IssueOrderUpdate]) -> Result<()>;
}

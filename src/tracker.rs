use crate::{
    auth::{AuthContext, OrganizationId, UserId},
    config::TrackerConfig,
    domain::{
        board::{compact_lane, next_order, reorder, IssueMove},
        issue::{Issue, IssueId, IssueOrderUpdate, IssuePriority, IssueStatus, IssueUpdate},
        project::{Project, ProjectId, ProjectWithSprints},
        sorting::{sort_issues, SortField, SortOrder},
        sprint::{Sprint, SprintId, SprintStatus, SprintUpdate},
    },
    error::{Result, SprintboardError},
    lifecycle,
    storage::Storage,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSprint {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: IssueStatus,
    #[serde(default)]
    pub priority: IssuePriority,
    pub sprint_id: SprintId,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
}

impl NewIssue {
    /// A TODO issue with medium priority and no assignee
    pub fn new(title: impl Into<String>, sprint_id: SprintId) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: IssueStatus::Todo,
            priority: IssuePriority::default(),
            sprint_id,
            assignee_id: None,
        }
    }
}

/// Edits a reporter or admin may make to an issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueChanges {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
}

/// The acting user's issues across the organization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserIssues {
    pub assigned: Vec<Issue>,
    pub reported: Vec<Issue>,
}

/// Organization-scoped operations over a [`Storage`] backend.
///
/// Every call takes the acting principal. Entities that live in another
/// organization are reported as not found.
pub struct Tracker<S: Storage> {
    storage: S,
    config: TrackerConfig,
}

impl<S: Storage> Tracker<S> {
    pub fn new(storage: S, config: TrackerConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    async fn owned_project(&self, org: &OrganizationId, id: &ProjectId) -> Result<Project> {
        let project = self.storage.load_project(id).await?;
        if !project.belongs_to(org) {
            return Err(SprintboardError::ProjectNotFound(id.to_string()));
        }
        Ok(project)
    }

    async fn owned_sprint(&self, org: &OrganizationId, id: &SprintId) -> Result<Sprint> {
        let sprint = self.storage.load_sprint(id).await?;
        match self.owned_project(org, &sprint.project_id).await {
            Ok(_) => Ok(sprint),
            Err(e) if e.is_not_found() => Err(SprintboardError::SprintNotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn owned_issue(&self, org: &OrganizationId, id: &IssueId) -> Result<Issue> {
        let issue = self.storage.load_issue(id).await?;
        match self.owned_project(org, &issue.project_id).await {
            Ok(_) => Ok(issue),
            Err(e) if e.is_not_found() => Err(SprintboardError::IssueNotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    fn require_reporter_or_admin(auth: &dyn AuthContext, issue: &Issue) -> Result<()> {
        if issue.is_reported_by(auth.user_id()) || auth.is_admin() {
            return Ok(());
        }
        tracing::warn!(
            issue_id = %issue.id,
            user_id = %auth.user_id(),
            "issue change rejected: not reporter or admin"
        );
        Err(SprintboardError::Unauthorized(
            "Only the reporter or an admin can change this issue".to_string(),
        ))
    }

    async fn persist_orders(&self, issues: &[Issue]) -> Result<()> {
        let updates: Vec<IssueOrderUpdate> = issues.iter().map(IssueOrderUpdate::from).collect();
        self.storage.update_issue_orders(&updates).await
    }

    pub async fn create_project(&self, auth: &dyn AuthContext, new: NewProject) -> Result<Project> {
        let org = auth.require_organization()?;
        auth.require_admin()?;

        let project = Project::new(new.name, new.key, new.description, org.clone())?;
        if self.storage.find_project_by_key(&project.key).await?.is_some() {
            return Err(SprintboardError::DuplicateProjectKey(project.key));
        }
        self.storage.save_project(&project).await?;

        tracing::info!(project_id = %project.id, key = %project.key, "project created");
        Ok(project)
    }

    pub async fn delete_project(&self, auth: &dyn AuthContext, id: &ProjectId) -> Result<()> {
        let org = auth.require_organization()?;
        auth.require_admin()?;

        self.owned_project(org, id).await?;
        self.storage.delete_project(id).await?;

        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }

    pub async fn list_projects(&self, auth: &dyn AuthContext) -> Result<Vec<Project>> {
        let org = auth.require_organization()?;
        self.storage.list_projects(org).await
    }

    pub async fn get_project(
        &self,
        auth: &dyn AuthContext,
        id: &ProjectId,
    ) -> Result<ProjectWithSprints> {
        let org = auth.require_organization()?;
        let project = self.owned_project(org, id).await?;
        let sprints = self.storage.list_sprints(id).await?;
        Ok(ProjectWithSprints { project, sprints })
    }

    pub async fn create_sprint(
        &self,
        auth: &dyn AuthContext,
        project_id: &ProjectId,
        new: NewSprint,
    ) -> Result<Sprint> {
        let org = auth.require_organization()?;
        self.owned_project(org, project_id).await?;

        let sprint = Sprint::new(*project_id, new.name, new.start_date, new.end_date)?;
        self.storage.save_sprint(&sprint).await?;

        tracing::info!(sprint_id = %sprint.id, project_id = %project_id, "sprint created");
        Ok(sprint)
    }

    pub async fn update_sprint_status(
        &self,
        auth: &dyn AuthContext,
        sprint_id: &SprintId,
        status: SprintStatus,
    ) -> Result<Sprint> {
        self.update_sprint_status_at(auth, sprint_id, status, Utc::now())
            .await
    }

    /// Same as [`Tracker::update_sprint_status`] with an explicit clock
    pub async fn update_sprint_status_at(
        &self,
        auth: &dyn AuthContext,
        sprint_id: &SprintId,
        status: SprintStatus,
        now: DateTime<Utc>,
    ) -> Result<Sprint> {
        let org = auth.require_organization()?;
        let sprint = self.owned_sprint(org, sprint_id).await?;
        let next = lifecycle::transition(&sprint, status, auth, now)?;

        if next.status == SprintStatus::Active && self.config.enforce_single_active_sprint {
            let sprints = self.storage.list_sprints(&sprint.project_id).await?;
            if sprints
                .iter()
                .any(|s| s.id != sprint.id && s.status == SprintStatus::Active)
            {
                return Err(SprintboardError::InvalidTransition {
                    from: sprint.status.to_string(),
                    to: status.to_string(),
                    reason: "Another sprint of this project is already active".to_string(),
                });
            }
        }

        let stored = self
            .storage
            .update_sprint(sprint_id, &SprintUpdate::status(next.status).at(next.updated_at))
            .await?;

        tracing::info!(
            sprint_id = %sprint_id,
            from = %sprint.status,
            to = %stored.status,
            "sprint transitioned"
        );
        Ok(stored)
    }

    pub async fn create_issue(
        &self,
        auth: &dyn AuthContext,
        project_id: &ProjectId,
        new: NewIssue,
    ) -> Result<Issue> {
        let org = auth.require_organization()?;
        self.owned_project(org, project_id).await?;

        let sprint = self.storage.load_sprint(&new.sprint_id).await?;
        if sprint.project_id != *project_id {
            return Err(SprintboardError::SprintNotFound(new.sprint_id.to_string()));
        }
        if sprint.status == SprintStatus::Completed {
            return Err(SprintboardError::Validation(
                "Cannot add issues to a completed sprint".to_string(),
            ));
        }

        let lane = self
            .storage
            .find_issues_by_sprint_and_status(&sprint.id, new.status)
            .await?;
        let issue = Issue::new(new.title, *project_id, sprint.id, auth.user_id().clone())?
            .with_description(new.description)
            .with_status(new.status)
            .with_priority(new.priority)
            .with_assignee(new.assignee_id)
            .with_order(next_order(&lane));
        self.storage.create_issue(&issue).await?;

        tracing::info!(issue_id = %issue.id, sprint_id = %sprint.id, "issue created");
        Ok(issue)
    }

    pub async fn get_issues_for_sprint(
        &self,
        auth: &dyn AuthContext,
        sprint_id: &SprintId,
    ) -> Result<Vec<Issue>> {
        let org = auth.require_organization()?;
        self.owned_sprint(org, sprint_id).await?;
        self.storage.list_issues_for_sprint(sprint_id).await
    }

    /// Applies a drag-and-drop move and persists the recomputed sprint.
    ///
    /// Returns the sprint's issues after the move. A move that leaves the
    /// issue where it is writes nothing.
    pub async fn move_issue(
        &self,
        auth: &dyn AuthContext,
        sprint_id: &SprintId,
        mv: IssueMove,
    ) -> Result<Vec<Issue>> {
        let org = auth.require_organization()?;
        let sprint = self.owned_sprint(org, sprint_id).await?;
        if sprint.status != SprintStatus::Active {
            return Err(SprintboardError::SprintNotActive(sprint_id.to_string()));
        }

        let issues = self.storage.list_issues_for_sprint(sprint_id).await?;
        let reordered = reorder(&issues, &mv)?;
        if mv.is_noop(&issues) {
            return Ok(reordered);
        }

        self.persist_orders(&reordered).await?;

        tracing::info!(
            issue_id = %mv.issue_id,
            from = %mv.from_status.as_str(),
            to = %mv.to_status.as_str(),
            index = mv.to_index,
            "board reordered"
        );
        Ok(reordered)
    }

    pub async fn update_issue(
        &self,
        auth: &dyn AuthContext,
        issue_id: &IssueId,
        changes: IssueChanges,
    ) -> Result<Issue> {
        let org = auth.require_organization()?;
        let issue = self.owned_issue(org, issue_id).await?;
        Self::require_reporter_or_admin(auth, &issue)?;

        // One write per edit: a status change carries the priority in its batch
        let updated = match changes.status.filter(|s| *s != issue.status) {
            Some(status) => {
                let issues = self.storage.list_issues_for_sprint(&issue.sprint_id).await?;
                let reordered = reorder(&issues, &IssueMove::to_end(&issue, status))?;
                let updates: Vec<IssueOrderUpdate> = reordered
                    .iter()
                    .map(|i| {
                        let update = IssueOrderUpdate::from(i);
                        if i.id == *issue_id {
                            update.with_priority(changes.priority)
                        } else {
                            update
                        }
                    })
                    .collect();
                self.storage.update_issue_orders(&updates).await?;
                self.storage.load_issue(issue_id).await?
            }
            None => match changes.priority {
                Some(priority) => {
                    let update = IssueUpdate {
                        priority: Some(priority),
                        ..IssueUpdate::default()
                    };
                    self.storage.update_issue(issue_id, &update).await?
                }
                None => issue,
            },
        };

        tracing::info!(issue_id = %issue_id, "issue updated");
        Ok(updated)
    }

    pub async fn delete_issue(&self, auth: &dyn AuthContext, issue_id: &IssueId) -> Result<()> {
        let org = auth.require_organization()?;
        let issue = self.owned_issue(org, issue_id).await?;
        Self::require_reporter_or_admin(auth, &issue)?;

        self.storage.delete_issue(issue_id).await?;

        let remaining = self
            .storage
            .find_issues_by_sprint_and_status(&issue.sprint_id, issue.status)
            .await?;
        let before: HashMap<IssueId, u32> = remaining.iter().map(|i| (i.id, i.order)).collect();
        let shifted: Vec<Issue> = compact_lane(&remaining, issue.status)
            .into_iter()
            .filter(|i| before.get(&i.id) != Some(&i.order))
            .collect();
        if !shifted.is_empty() {
            self.persist_orders(&shifted).await?;
        }

        tracing::info!(issue_id = %issue_id, "issue deleted");
        Ok(())
    }

    pub async fn get_user_issues(&self, auth: &dyn AuthContext) -> Result<UserIssues> {
        let org = auth.require_organization()?;
        let user = auth.user_id();

        let mut result = UserIssues::default();
        for project in self.storage.list_projects(org).await? {
            for issue in self.storage.list_issues_for_project(&project.id).await? {
                if issue.is_assigned_to(user) {
                    result.assigned.push(issue.clone());
                }
                if issue.is_reported_by(user) {
                    result.reported.push(issue);
                }
            }
        }
        sort_issues(&mut result.assigned, SortField::Updated, SortOrder::Descending);
        sort_issues(&mut result.reported, SortField::Updated, SortOrder::Descending);
        Ok(result)
    }
}

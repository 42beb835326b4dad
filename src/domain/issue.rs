use crate::{
    auth::UserId,
    domain::{project::ProjectId, sprint::SprintId},
    error::{Result, SprintboardError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

uuid_id!(
    /// Unique identifier for an issue
    IssueId,
    "issue"
);

/// Board column an issue sits in
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
}

impl IssueStatus {
    /// All statuses in board order
    pub const ALL: [IssueStatus; 4] = [Self::Todo, Self::InProgress, Self::InReview, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "Todo"),
            Self::InProgress => write!(f, "In Progress"),
            Self::InReview => write!(f, "In Review"),
            Self::Done => write!(f, "Done"),
        }
    }
}

impl FromStr for IssueStatus {
    type Err = SprintboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().replace(|c: char| c == ' ' || c == '-', "_").as_str() {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "IN_REVIEW" => Ok(Self::InReview),
            "DONE" => Ok(Self::Done),
            _ => Err(SprintboardError::Validation(format!(
                "Invalid issue status '{}'. Valid statuses: TODO, IN_PROGRESS, IN_REVIEW, DONE",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Urgent => write!(f, "Urgent"),
        }
    }
}

impl FromStr for IssuePriority {
    type Err = SprintboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(SprintboardError::Validation(format!(
                "Invalid priority '{}'. Valid priorities: LOW, MEDIUM, HIGH, URGENT",
                s
            ))),
        }
    }
}

/// A work item on a sprint board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    /// Position inside the (sprint, status) lane, zero-based
    pub order: u32,
    pub sprint_id: SprintId,
    pub project_id: ProjectId,
    pub reporter_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Creates a new issue at position 0 of the TODO lane
    pub fn new(
        title: String,
        project_id: ProjectId,
        sprint_id: SprintId,
        reporter_id: UserId,
    ) -> Result<Self> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(SprintboardError::Validation("Title is required".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: IssueId::new(),
            title,
            description: None,
            status: IssueStatus::Todo,
            priority: IssuePriority::default(),
            order: 0,
            sprint_id,
            project_id,
            reporter_id,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: IssuePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn with_assignee(mut self, assignee: Option<UserId>) -> Self {
        self.assignee_id = assignee;
        self
    }

    pub fn is_reported_by(&self, user: &UserId) -> bool {
        &self.reporter_id == user
    }

    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.assignee_id.as_ref() == Some(user)
    }
}

/// Field changes accepted by `Storage::update_issue`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueUpdate {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub order: Option<u32>,
    /// `Some(None)` clears the assignee
    pub assignee_id: Option<Option<UserId>>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.order.is_none()
            && self.assignee_id.is_none()
    }

    pub fn apply_to(&self, issue: &mut Issue) {
        if let Some(status) = self.status {
            issue.status = status;
        }
        if let Some(priority) = self.priority {
            issue.priority = priority;
        }
        if let Some(order) = self.order {
            issue.order = order;
        }
        if let Some(assignee) = &self.assignee_id {
            issue.assignee_id = assignee.clone();
        }
        issue.updated_at = Utc::now();
    }
}

/// One row of a batch order write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueOrderUpdate {
    pub id: IssueId,
    pub status: IssueStatus,
    pub order: u32,
    /// Written in the same batch when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<IssuePriority>,
}

impl IssueOrderUpdate {
    pub fn new(id: IssueId, status: IssueStatus, order: u32) -> Self {
        Self {
            id,
            status,
            order,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: Option<IssuePriority>) -> Self {
        self.priority = priority;
        self
    }
}

impl From<&Issue> for IssueOrderUpdate {
    fn from(issue: &Issue) -> Self {
        Self::new(issue.id, issue.status, issue.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str) -> Issue {
        Issue::new(
            title.to_string(),
            ProjectId::new(),
            SprintId::new(),
            UserId::new("user_1"),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_creation() {
        let issue = issue(" Fix login ");
        assert_eq!(issue.title, "Fix login");
        assert_eq!(issue.status, IssueStatus::Todo);
        assert_eq!(issue.priority, IssuePriority::Medium);
        assert_eq!(issue.order, 0);
        assert!(issue.is_reported_by(&UserId::new("user_1")));
        assert!(!issue.is_assigned_to(&UserId::new("user_1")));
    }

    #[test]
    fn test_issue_requires_title() {
        let result = Issue::new(
            "   ".to_string(),
            ProjectId::new(),
            SprintId::new(),
            UserId::new("user_1"),
        );
        assert!(matches!(result, Err(SprintboardError::Validation(_))));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(IssueStatus::from_str("in_progress").unwrap(), IssueStatus::InProgress);
        assert_eq!(IssueStatus::from_str("In Review").unwrap(), IssueStatus::InReview);
        assert_eq!(IssueStatus::from_str("todo").unwrap(), IssueStatus::Todo);
        assert!(IssueStatus::from_str("blocked").is_err());
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!(IssuePriority::from_str("urgent").unwrap(), IssuePriority::Urgent);
        assert!(IssuePriority::from_str("critical").is_err());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let priority: IssuePriority = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(priority, IssuePriority::High);
    }

    #[test]
    fn test_issue_update_apply() {
        let mut issue = issue("Task").with_assignee(Some(UserId::new("user_2")));
        let update = IssueUpdate {
            status: Some(IssueStatus::Done),
            priority: Some(IssuePriority::Urgent),
            order: Some(3),
            assignee_id: Some(None),
        };
        assert!(!update.is_empty());

        update.apply_to(&mut issue);
        assert_eq!(issue.status, IssueStatus::Done);
        assert_eq!(issue.priority, IssuePriority::Urgent);
        assert_eq!(issue.order, 3);
        assert!(issue.assignee_id.is_none());
        assert!(IssueUpdate::default().is_empty());
    }

    #[test]
    fn test_issue_serialization_without_assignee() {
        let issue = issue("Task");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(!json.contains("assignee_id"));

        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}

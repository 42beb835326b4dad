use crate::{
    domain::project::ProjectId,
    error::{Result, SprintboardError},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

uuid_id!(
    /// Unique identifier for a sprint
    SprintId,
    "sprint"
);

/// Lifecycle state of a sprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub const ALL: [SprintStatus; 3] = [Self::Planned, Self::Active, Self::Completed];

    /// Wire name used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        }
    }

    /// Checks if a status transition is valid. Sprints only move forward.
    pub fn can_transition_to(&self, target: &SprintStatus) -> bool {
        matches!(
            (self, target),
            (Self::Planned, Self::Active) | (Self::Active, Self::Completed)
        )
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SprintStatus {
    type Err = SprintboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Ok(Self::Planned),
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(SprintboardError::Validation(format!(
                "Invalid sprint status '{}'. Valid statuses: PLANNED, ACTIVE, COMPLETED",
                s
            ))),
        }
    }
}

/// Human-facing remark about where a sprint stands relative to its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintNote {
    Ended,
    Overdue(Duration),
    StartsIn(Duration),
}

impl fmt::Display for SprintNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended => write!(f, "Sprint Ended"),
            Self::Overdue(by) => write!(f, "Sprint Overdue by {}", describe_duration(*by)),
            Self::StartsIn(d) => write!(f, "Sprint starts in {}", describe_duration(*d)),
        }
    }
}

fn describe_duration(d: Duration) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    if d.num_days() >= 1 {
        plural(d.num_days(), "day")
    } else if d.num_hours() >= 1 {
        plural(d.num_hours(), "hour")
    } else if d.num_minutes() >= 1 {
        plural(d.num_minutes(), "minute")
    } else {
        "less than a minute".to_string()
    }
}

/// A time-boxed iteration of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: SprintId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SprintStatus,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sprint {
    pub const MAX_NAME_LEN: usize = 100;

    /// Creates a new planned sprint after validating its name and date range
    pub fn new(
        project_id: ProjectId,
        name: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(SprintboardError::Validation(
                "Sprint name is required".to_string(),
            ));
        }
        if name.chars().count() > Self::MAX_NAME_LEN {
            return Err(SprintboardError::Validation(format!(
                "Sprint name must be {} characters or less",
                Self::MAX_NAME_LEN
            )));
        }
        validate_date_range(start_date, end_date)?;

        let now = Utc::now();
        Ok(Self {
            id: SprintId::new(),
            name,
            start_date,
            end_date,
            status: SprintStatus::Planned,
            project_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets both dates with validation
    pub fn set_date_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        validate_date_range(start, end)?;
        self.start_date = start;
        self.end_date = end;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether `now` falls inside the sprint window, bounds included
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date && now <= self.end_date
    }

    /// A planned sprint can be started while its window is open
    pub fn can_start(&self, now: DateTime<Utc>) -> bool {
        self.status == SprintStatus::Planned && self.is_within_window(now)
    }

    pub fn can_end(&self) -> bool {
        self.status == SprintStatus::Active
    }

    pub fn status_note(&self, now: DateTime<Utc>) -> Option<SprintNote> {
        match self.status {
            SprintStatus::Completed => Some(SprintNote::Ended),
            SprintStatus::Active if now > self.end_date => {
                Some(SprintNote::Overdue(now - self.end_date))
            }
            SprintStatus::Planned if now < self.start_date => {
                Some(SprintNote::StartsIn(self.start_date - now))
            }
            _ => None,
        }
    }
}

fn validate_date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(SprintboardError::InvalidDateRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(())
}

/// Field changes accepted by `Storage::update_sprint`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SprintUpdate {
    pub status: Option<SprintStatus>,
    /// Timestamp to record; the current time when unset
    pub updated_at: Option<DateTime<Utc>>,
}

impl SprintUpdate {
    pub fn status(status: SprintStatus) -> Self {
        Self {
            status: Some(status),
            updated_at: None,
        }
    }

    pub fn at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn apply_to(&self, sprint: &mut Sprint) {
        if let Some(status) = self.status {
            sprint.status = status;
        }
        sprint.updated_at = self.updated_at.unwrap_or_else(Utc::now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprint_around(now: DateTime<Utc>) -> Sprint {
        Sprint::new(
            ProjectId::new(),
            "Sprint 1".to_string(),
            now - Duration::days(1),
            now + Duration::days(6),
        )
        .unwrap()
    }

    #[test]
    fn test_sprint_creation() {
        let sprint = sprint_around(Utc::now());
        assert_eq!(sprint.status, SprintStatus::Planned);
        assert_eq!(sprint.name, "Sprint 1");
    }

    #[test]
    fn test_sprint_creation_validation() {
        let now = Utc::now();
        let project = ProjectId::new();

        assert!(Sprint::new(project, "  ".to_string(), now, now).is_err());
        assert!(Sprint::new(project, "x".repeat(101), now, now).is_err());

        let err = Sprint::new(project, "S".to_string(), now, now - Duration::days(1)).unwrap_err();
        assert!(matches!(err, SprintboardError::InvalidDateRange { .. }));

        // Single-instant sprint is allowed
        assert!(Sprint::new(project, "S".to_string(), now, now).is_ok());
    }

    #[test]
    fn test_status_transitions() {
        assert!(SprintStatus::Planned.can_transition_to(&SprintStatus::Active));
        assert!(SprintStatus::Active.can_transition_to(&SprintStatus::Completed));
        assert!(!SprintStatus::Planned.can_transition_to(&SprintStatus::Completed));
        assert!(!SprintStatus::Active.can_transition_to(&SprintStatus::Planned));
        assert!(!SprintStatus::Completed.can_transition_to(&SprintStatus::Active));
        assert!(!SprintStatus::Active.can_transition_to(&SprintStatus::Active));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SprintStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(SprintStatus::from_str("active").unwrap(), SprintStatus::Active);
        assert!(SprintStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_can_start_and_end() {
        let now = Utc::now();
        let mut sprint = sprint_around(now);

        assert!(sprint.can_start(now));
        assert!(!sprint.can_start(now + Duration::days(30)));
        assert!(!sprint.can_end());

        sprint.status = SprintStatus::Active;
        assert!(!sprint.can_start(now));
        assert!(sprint.can_end());
    }

    #[test]
    fn test_status_note() {
        let now = Utc::now();
        let mut sprint = sprint_around(now);
        assert_eq!(sprint.status_note(now), None);

        let early = now - Duration::days(3);
        assert_eq!(
            sprint.status_note(early),
            Some(SprintNote::StartsIn(Duration::days(2)))
        );
        assert_eq!(
            sprint.status_note(early).unwrap().to_string(),
            "Sprint starts in 2 days"
        );

        sprint.status = SprintStatus::Active;
        let late = sprint.end_date + Duration::hours(5);
        assert_eq!(
            sprint.status_note(late).unwrap().to_string(),
            "Sprint Overdue by 5 hours"
        );

        sprint.status = SprintStatus::Completed;
        assert_eq!(sprint.status_note(now), Some(SprintNote::Ended));
    }

    #[test]
    fn test_set_date_range() {
        let now = Utc::now();
        let mut sprint = sprint_around(now);
        assert!(sprint
            .set_date_range(now + Duration::days(1), now)
            .is_err());
        assert!(sprint
            .set_date_range(now, now + Duration::days(14))
            .is_ok());
        assert_eq!(sprint.end_date, now + Duration::days(14));
    }

    #[test]
    fn test_sprint_update_applies_status() {
        let mut sprint = sprint_around(Utc::now());
        let name = sprint.name.clone();
        SprintUpdate::status(SprintStatus::Active).apply_to(&mut sprint);
        assert_eq!(sprint.status, SprintStatus::Active);
        assert_eq!(sprint.name, name);
    }

    #[test]
    fn test_sprint_update_records_given_time() {
        let mut sprint = sprint_around(Utc::now());
        let at = sprint.end_date + Duration::hours(3);

        SprintUpdate::status(SprintStatus::Completed)
            .at(at)
            .apply_to(&mut sprint);

        assert_eq!(sprint.updated_at, at);
    }
}

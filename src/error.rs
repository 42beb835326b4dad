use thiserror::Error;

pub type Result<T> = std::result::Result<T, SprintboardError>;

/// Coarse classification of failures, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidTransition,
    Validation,
    Persistence,
}

#[derive(Debug, Error)]
pub enum SprintboardError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Sprint not found: {0}")]
    SprintNotFound(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Invalid sprint transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Sprint {0} is not active. Start the sprint to update the board")]
    SprintNotActive(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Project key already exists: {0}")]
    DuplicateProjectKey(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "sqlite-storage")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SprintboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ProjectNotFound(_) | Self::SprintNotFound(_) | Self::IssueNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidTransition { .. } | Self::SprintNotActive(_) => {
                ErrorKind::InvalidTransition
            }
            Self::InvalidDateRange { .. }
            | Self::Validation(_)
            | Self::DuplicateProjectKey(_)
            | Self::ConfigError(_) => ErrorKind::Validation,
            Self::StorageError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorKind::Persistence
            }
            #[cfg(feature = "sqlite-storage")]
            Self::SqliteError(_) => ErrorKind::Persistence,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SprintboardError::Unauthorized("x".to_string()).kind(),
            ErrorKind::Unauthorized
        );
        assert!(SprintboardError::IssueNotFound("x".to_string()).is_not_found());
        assert!(!SprintboardError::Validation("x".to_string()).is_not_found());
        assert_eq!(
            SprintboardError::SprintNotActive("s".to_string()).kind(),
            ErrorKind::InvalidTransition
        );

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(SprintboardError::from(io).kind(), ErrorKind::Persistence);
    }
}

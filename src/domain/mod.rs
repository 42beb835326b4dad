/// Declares a UUID-backed identifier newtype
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generates a fresh random identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::SprintboardError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim()).map(Self).map_err(|_| {
                    crate::error::SprintboardError::Validation(format!(
                        "Invalid {} id: {}",
                        $label, s
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub mod board;
pub mod issue;
pub mod project;
pub mod sorting;
pub mod sprint;

pub use board::{current_sprint, reorder, Board, BoardConfig, Column, IssueMove, Lane};
pub use issue::{Issue, IssueId, IssueOrderUpdate, IssuePriority, IssueStatus, IssueUpdate};
pub use project::{Project, ProjectId, ProjectWithSprints};
pub use sorting::{sort_for_board, sort_issues, SortField, SortOrder};
pub use sprint::{Sprint, SprintId, SprintNote, SprintStatus, SprintUpdate};

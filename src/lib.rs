//! # Sprintboard Core
//!
//! Core business logic and domain models for sprint-based project tracking.
//!
//! This crate provides the sprint lifecycle state machine, the issue ordering
//! engine behind the kanban board, and an organization-scoped service layer
//! over pluggable storage backends. It has no dependency on any particular UI
//! or identity provider; the acting principal is passed in through
//! [`auth::AuthContext`].

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod storage;
pub mod tracker;

// Re-export commonly used types
pub use auth::{AuthContext, OrganizationId, Principal, Role, UserId};
pub use config::TrackerConfig;
pub use domain::{
    board::{reorder, Board, BoardConfig, Column, IssueMove},
    issue::{Issue, IssueId, IssuePriority, IssueStatus},
    project::{Project, ProjectId},
    sprint::{Sprint, SprintId, SprintStatus},
};
pub use error::{ErrorKind, Result, SprintboardError};
pub use storage::Storage;
pub use tracker::Tracker;

use crate::{
    auth::{AuthContext, Role},
    domain::sprint::{Sprint, SprintStatus},
    error::{Result, SprintboardError},
};
use chrono::{DateTime, Utc};

/// Computes the sprint that results from moving `sprint` to `requested` at `now`.
///
/// Sprints move PLANNED → ACTIVE → COMPLETED. Starting is only allowed inside
/// the date window and completing only once the end date has passed. Both
/// require the admin role.
///
/// Nothing is persisted here; the caller stores the returned sprint.
pub fn transition(
    sprint: &Sprint,
    requested: SprintStatus,
    auth: &dyn AuthContext,
    now: DateTime<Utc>,
) -> Result<Sprint> {
    if !auth.has_role(Role::Admin) {
        tracing::warn!(
            sprint_id = %sprint.id,
            user_id = %auth.user_id(),
            "sprint transition rejected for non-admin"
        );
        return Err(SprintboardError::Unauthorized(
            "Only Admin can make this change".to_string(),
        ));
    }

    let reject = |reason: &str| SprintboardError::InvalidTransition {
        from: sprint.status.to_string(),
        to: requested.to_string(),
        reason: reason.to_string(),
    };

    match requested {
        SprintStatus::Active => {
            if !sprint.is_within_window(now) {
                return Err(reject("Cannot start sprint outside of its date range"));
            }
        }
        SprintStatus::Completed => {
            if sprint.status != SprintStatus::Active {
                return Err(reject("Can only complete an active sprint"));
            }
            if now < sprint.end_date {
                return Err(reject("Cannot end sprint before its end date"));
            }
        }
        SprintStatus::Planned => {}
    }

    if !sprint.status.can_transition_to(&requested) {
        return Err(reject("Sprints only move from PLANNED to ACTIVE to COMPLETED"));
    }

    let mut updated = sprint.clone();
    updated.status = requested;
    updated.updated_at = now;
    Ok(updated)
}

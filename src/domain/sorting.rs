use crate::domain::issue::Issue;

/// Fields available for sorting issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    Status,
    Priority,
    Order,
    Created,
    Updated,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sorts issues in-place by a single field.
///
/// Status sorts by workflow position (TODO first, DONE last) and priority by
/// severity (LOW first). The sort is stable, so equal keys keep their
/// relative order.
///
/// # Examples
/// ```
/// use sprintboard_core::auth::UserId;
/// use sprintboard_core::domain::sorting::{sort_issues, SortField, SortOrder};
/// use sprintboard_core::domain::{Issue, ProjectId, SprintId};
///
/// let new_issue = |title: &str| {
///     Issue::new(title.to_string(), ProjectId::new(), SprintId::new(), UserId::new("u1")).unwrap()
/// };
/// let mut issues = vec![new_issue("b"), new_issue("C"), new_issue("a")];
///
/// sort_issues(&mut issues, SortField::Title, SortOrder::Ascending);
/// assert_eq!(issues[0].title, "a");
/// assert_eq!(issues[2].title, "C");
/// ```
pub fn sort_issues(issues: &mut [Issue], field: SortField, order: SortOrder) {
    issues.sort_by(|a, b| {
        let cmp = match field {
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Order => a.order.cmp(&b.order),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
        };

        match order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
}

/// Board order: by status, then by lane position
pub fn sort_for_board(issues: &mut [Issue]) {
    issues.sort_by(|a, b| a.status.cmp(&b.status).then(a.order.cmp(&b.order)));
}

use crate::{
    domain::{
        issue::{Issue, IssueId, IssueOrderUpdate, IssueStatus},
        sorting::sort_for_board,
        sprint::{Sprint, SprintStatus},
    },
    error::{Result, SprintboardError},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for a kanban board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub status: IssueStatus,
}

impl Column {
    pub fn new(name: impl Into<String>, status: IssueStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub columns: Vec<Column>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: IssueStatus::ALL
                .iter()
                .map(|status| Column::new(status.to_string(), *status))
                .collect(),
        }
    }
}

impl BoardConfig {
    /// Every issue status must map to exactly one column
    pub fn validate(&self) -> Result<()> {
        for status in IssueStatus::ALL {
            let count = self
                .columns
                .iter()
                .filter(|col| col.status == status)
                .count();
            if count != 1 {
                return Err(SprintboardError::ConfigError(format!(
                    "Board must have exactly one column for status {}, found {}",
                    status.as_str(),
                    count
                )));
            }
        }
        Ok(())
    }

    /// Gets the column configuration for a status
    pub fn get_column_for_status(&self, status: &IssueStatus) -> Option<&Column> {
        self.columns.iter().find(|col| &col.status == status)
    }
}

/// A drag-and-drop instruction for one issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMove {
    pub issue_id: IssueId,
    pub from_status: IssueStatus,
    pub to_status: IssueStatus,
    /// Target position in the destination lane; clamped to the lane's end
    pub to_index: usize,
}

impl IssueMove {
    pub fn new(
        issue_id: IssueId,
        from_status: IssueStatus,
        to_status: IssueStatus,
        to_index: usize,
    ) -> Self {
        Self {
            issue_id,
            from_status,
            to_status,
            to_index,
        }
    }

    /// Moves `issue` to the end of the `to_status` lane
    pub fn to_end(issue: &Issue, to_status: IssueStatus) -> Self {
        Self::new(issue.id, issue.status, to_status, usize::MAX)
    }

    /// True when applying the move would leave every issue where it is
    pub fn is_noop(&self, issues: &[Issue]) -> bool {
        if self.from_status != self.to_status {
            return false;
        }
        let lane = lane(issues, self.from_status);
        match lane.iter().position(|issue| issue.id == self.issue_id) {
            Some(current) => current == self.to_index.min(lane.len() - 1),
            None => false,
        }
    }
}

/// Issues of one status, ordered by their lane position
pub fn lane(issues: &[Issue], status: IssueStatus) -> Vec<&Issue> {
    let mut lane: Vec<&Issue> = issues.iter().filter(|i| i.status == status).collect();
    lane.sort_by_key(|i| i.order);
    lane
}

/// Next free position at the end of a lane
pub fn next_order(lane: &[Issue]) -> u32 {
    lane.iter().map(|i| i.order + 1).max().unwrap_or(0)
}

/// Applies a board move to a sprint's issue set.
///
/// The moved issue leaves its lane and is inserted at `to_index` of the
/// destination lane (the same lane for a reorder). Every touched lane gets
/// `order = index` reassigned, so it ends up dense and zero-based. Lanes the
/// move does not touch come back unchanged. The result is stably sorted by
/// `order`.
///
/// A move that leaves the issue at its current position returns the input
/// unchanged; callers should use [`IssueMove::is_noop`] to skip persisting it.
pub fn reorder(issues: &[Issue], mv: &IssueMove) -> Result<Vec<Issue>> {
    let moved = issues
        .iter()
        .find(|issue| issue.id == mv.issue_id)
        .ok_or_else(|| SprintboardError::IssueNotFound(mv.issue_id.to_string()))?;

    if moved.status != mv.from_status {
        return Err(SprintboardError::Validation(format!(
            "Issue {} is in {}, not {}",
            mv.issue_id,
            moved.status.as_str(),
            mv.from_status.as_str()
        )));
    }

    if mv.is_noop(issues) {
        tracing::debug!(issue_id = %mv.issue_id, "board move leaves issue in place");
        return Ok(issues.to_vec());
    }

    let lane_ids = |status: IssueStatus| -> Vec<IssueId> {
        lane(issues, status).into_iter().map(|i| i.id).collect()
    };

    let mut source = lane_ids(mv.from_status);
    source.retain(|id| *id != mv.issue_id);

    let mut assignments: HashMap<IssueId, (IssueStatus, u32)> = HashMap::new();
    let mut assign = |ids: &[IssueId], status: IssueStatus| {
        for (index, id) in ids.iter().enumerate() {
            assignments.insert(*id, (status, index as u32));
        }
    };

    if mv.from_status == mv.to_status {
        let index = mv.to_index.min(source.len());
        source.insert(index, mv.issue_id);
        assign(&source, mv.from_status);
    } else {
        let mut destination = lane_ids(mv.to_status);
        let index = mv.to_index.min(destination.len());
        destination.insert(index, mv.issue_id);
        assign(&source, mv.from_status);
        assign(&destination, mv.to_status);
    }

    let mut reordered = issues.to_vec();
    for issue in reordered.iter_mut() {
        if let Some((status, order)) = assignments.get(&issue.id) {
            issue.status = *status;
            issue.order = *order;
        }
    }
    reordered.sort_by_key(|issue| issue.order);

    Ok(reordered)
}

/// Closes the gap an issue leaves behind in its lane
pub fn compact_lane(issues: &[Issue], status: IssueStatus) -> Vec<Issue> {
    let positions: HashMap<IssueId, u32> = lane(issues, status)
        .into_iter()
        .enumerate()
        .map(|(index, issue)| (issue.id, index as u32))
        .collect();

    let mut compacted = issues.to_vec();
    for issue in compacted.iter_mut() {
        if let Some(order) = positions.get(&issue.id) {
            issue.order = *order;
        }
    }
    compacted.sort_by_key(|issue| issue.order);
    compacted
}

/// Picks the sprint a board opens on: the active one, otherwise the first listed
pub fn current_sprint(sprints: &[Sprint]) -> Option<&Sprint> {
    sprints
        .iter()
        .find(|sprint| sprint.status == SprintStatus::Active)
        .or_else(|| sprints.first())
}

/// A column of the board with its issues in lane order
#[derive(Debug, Clone)]
pub struct Lane<'a> {
    pub column: &'a Column,
    pub issues: Vec<&'a Issue>,
}

/// Client-side projection of one sprint's board.
///
/// Holds a disposable copy of the sprint's issues. Moves are applied
/// optimistically through [`reorder`], the same function the tracker uses
/// before persisting, so both sides agree on the result.
#[derive(Debug, Clone)]
pub struct Board {
    pub sprint: Sprint,
    pub config: BoardConfig,
    issues: Vec<Issue>,
}

impl Board {
    pub fn new(sprint: Sprint, config: BoardConfig, mut issues: Vec<Issue>) -> Self {
        issues.retain(|issue| issue.sprint_id == sprint.id);
        sort_for_board(&mut issues);
        Self {
            sprint,
            config,
            issues,
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn lane(&self, status: IssueStatus) -> Vec<&Issue> {
        lane(&self.issues, status)
    }

    pub fn lanes(&self) -> Vec<Lane<'_>> {
        self.config
            .columns
            .iter()
            .map(|column| Lane {
                column,
                issues: self.lane(column.status),
            })
            .collect()
    }

    /// Only an active sprint accepts board moves
    pub fn is_locked(&self) -> bool {
        self.sprint.status != SprintStatus::Active
    }

    pub fn can_create_issue(&self) -> bool {
        self.sprint.status != SprintStatus::Completed
    }

    /// Applies `mv` to the local state. Returns whether anything changed.
    pub fn apply_move(&mut self, mv: &IssueMove) -> Result<bool> {
        if self.is_locked() {
            return Err(SprintboardError::SprintNotActive(self.sprint.id.to_string()));
        }
        if mv.is_noop(&self.issues) {
            return Ok(false);
        }
        self.issues = reorder(&self.issues, mv)?;
        Ok(true)
    }

    /// Swaps in a fresh copy of an issue, e.g. after an edit
    pub fn replace_issue(&mut self, updated: Issue) {
        if let Some(slot) = self.issues.iter_mut().find(|i| i.id == updated.id) {
            *slot = updated;
        }
    }

    pub fn order_updates(&self) -> Vec<IssueOrderUpdate> {
        self.issues.iter().map(IssueOrderUpdate::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;
    use crate::domain::{project::ProjectId, sprint::SprintId};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn issue(title: &str, status: IssueStatus, order: u32) -> Issue {
        Issue::new(
            title.to_string(),
            ProjectId::new(),
            SprintId::new(),
            UserId::new("user_1"),
        )
        .unwrap()
        .with_status(status)
        .with_order(order)
    }

    fn titles(issues: &[Issue], status: IssueStatus) -> Vec<(String, u32)> {
        lane(issues, status)
            .into_iter()
            .map(|i| (i.title.clone(), i.order))
            .collect()
    }

    fn expect(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(t, o)| (t.to_string(), *o)).collect()
    }

    fn find<'a>(issues: &'a [Issue], title: &str) -> &'a Issue {
        issues.iter().find(|i| i.title == title).unwrap()
    }

    fn lanes_dense(issues: &[Issue]) -> bool {
        IssueStatus::ALL.iter().all(|status| {
            lane(issues, *status)
                .iter()
                .enumerate()
                .all(|(index, issue)| issue.order == index as u32)
        })
    }

    #[test]
    fn test_board_config_default() {
        let config = BoardConfig::default();
        assert_eq!(config.columns.len(), 4);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.get_column_for_status(&IssueStatus::InReview).unwrap().name,
            "In Review"
        );
    }

    #[test]
    fn test_board_config_validation() {
        let mut config = BoardConfig::default();
        config.columns.pop();
        assert!(config.validate().is_err());

        let mut config = BoardConfig::default();
        config.columns.push(Column::new("Again", IssueStatus::Todo));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_move_across_lanes() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
            issue("C", IssueStatus::InProgress, 0),
        ];
        let b = find(&issues, "B");
        let mv = IssueMove::new(b.id, IssueStatus::Todo, IssueStatus::InProgress, 0);

        let result = reorder(&issues, &mv).unwrap();

        assert_eq!(titles(&result, IssueStatus::Todo), expect(&[("A", 0)]));
        assert_eq!(
            titles(&result, IssueStatus::InProgress),
            expect(&[("B", 0), ("C", 1)])
        );
        assert_eq!(find(&result, "B").status, IssueStatus::InProgress);
    }

    #[test]
    fn test_move_within_lane() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
            issue("C", IssueStatus::Todo, 2),
        ];
        let c = find(&issues, "C");
        let mv = IssueMove::new(c.id, IssueStatus::Todo, IssueStatus::Todo, 0);

        let result = reorder(&issues, &mv).unwrap();

        assert_eq!(
            titles(&result, IssueStatus::Todo),
            expect(&[("C", 0), ("A", 1), ("B", 2)])
        );
    }

    #[test]
    fn test_same_position_is_noop() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
        ];
        let a = find(&issues, "A");
        let mv = IssueMove::new(a.id, IssueStatus::Todo, IssueStatus::Todo, 0);

        assert!(mv.is_noop(&issues));
        assert_eq!(reorder(&issues, &mv).unwrap(), issues);
    }

    #[test]
    fn test_last_issue_past_end_is_noop() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
        ];
        let b = find(&issues, "B");
        let mv = IssueMove::new(b.id, IssueStatus::Todo, IssueStatus::Todo, 10);
        assert!(mv.is_noop(&issues));
    }

    #[test]
    fn test_only_issue_to_empty_lane() {
        let issues = vec![issue("A", IssueStatus::Todo, 0)];
        let mv = IssueMove::new(issues[0].id, IssueStatus::Todo, IssueStatus::Done, 0);

        let result = reorder(&issues, &mv).unwrap();

        assert!(lane(&result, IssueStatus::Todo).is_empty());
        assert_eq!(titles(&result, IssueStatus::Done), expect(&[("A", 0)]));
    }

    #[test]
    fn test_index_past_end_is_clamped() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::InReview, 0),
            issue("C", IssueStatus::InReview, 1),
        ];
        let a = find(&issues, "A");
        let mv = IssueMove::new(a.id, IssueStatus::Todo, IssueStatus::InReview, 99);

        let result = reorder(&issues, &mv).unwrap();

        assert_eq!(
            titles(&result, IssueStatus::InReview),
            expect(&[("B", 0), ("C", 1), ("A", 2)])
        );
    }

    #[test]
    fn test_untouched_lanes_unchanged() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
            issue("D", IssueStatus::Done, 0),
            issue("E", IssueStatus::Done, 1),
        ];
        let b = find(&issues, "B");
        let mv = IssueMove::new(b.id, IssueStatus::Todo, IssueStatus::Todo, 0);

        let result = reorder(&issues, &mv).unwrap();

        for title in ["D", "E"] {
            assert_eq!(find(&result, title), find(&issues, title));
        }
    }

    #[test]
    fn test_result_sorted_by_order() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
            issue("C", IssueStatus::Todo, 2),
            issue("D", IssueStatus::Done, 0),
        ];
        let a = find(&issues, "A");
        let mv = IssueMove::new(a.id, IssueStatus::Todo, IssueStatus::Todo, 2);

        let result = reorder(&issues, &mv).unwrap();

        let orders: Vec<u32> = result.iter().map(|i| i.order).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn test_unknown_issue() {
        let issues = vec![issue("A", IssueStatus::Todo, 0)];
        let mv = IssueMove::new(IssueId::new(), IssueStatus::Todo, IssueStatus::Done, 0);

        let err = reorder(&issues, &mv).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_wrong_source_status() {
        let issues = vec![issue("A", IssueStatus::Todo, 0)];
        let mv = IssueMove::new(issues[0].id, IssueStatus::Done, IssueStatus::Todo, 0);

        let err = reorder(&issues, &mv).unwrap_err();
        assert!(matches!(err, SprintboardError::Validation(_)));
    }

    #[test]
    fn test_compact_lane() {
        let issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("C", IssueStatus::Todo, 2),
            issue("D", IssueStatus::Done, 5),
        ];

        let result = compact_lane(&issues, IssueStatus::Todo);

        assert_eq!(titles(&result, IssueStatus::Todo), expect(&[("A", 0), ("C", 1)]));
        assert_eq!(find(&result, "D").order, 5);
    }

    #[test]
    fn test_next_order() {
        assert_eq!(next_order(&[]), 0);
        let lane = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
        ];
        assert_eq!(next_order(&lane), 2);
    }

    #[test]
    fn test_current_sprint() {
        let now = Utc::now();
        let project = ProjectId::new();
        let planned = Sprint::new(project, "One".to_string(), now, now + Duration::days(7)).unwrap();
        let mut active = Sprint::new(project, "Two".to_string(), now, now + Duration::days(7)).unwrap();
        active.status = SprintStatus::Active;

        let sprints = vec![planned.clone(), active.clone()];
        assert_eq!(current_sprint(&sprints).unwrap().id, active.id);

        let sprints = vec![planned.clone()];
        assert_eq!(current_sprint(&sprints).unwrap().id, planned.id);

        assert!(current_sprint(&[]).is_none());
    }

    fn board_with(status: SprintStatus) -> Board {
        let now = Utc::now();
        let mut sprint = Sprint::new(
            ProjectId::new(),
            "Sprint".to_string(),
            now - Duration::days(1),
            now + Duration::days(1),
        )
        .unwrap();
        sprint.status = status;

        let mut issues = vec![
            issue("A", IssueStatus::Todo, 0),
            issue("B", IssueStatus::Todo, 1),
            issue("C", IssueStatus::InProgress, 0),
        ];
        for issue in issues.iter_mut() {
            issue.sprint_id = sprint.id;
        }
        // Belongs to another sprint and is dropped from the projection
        issues.push(issue("X", IssueStatus::Todo, 2));

        Board::new(sprint, BoardConfig::default(), issues)
    }

    #[test]
    fn test_board_lanes() {
        let board = board_with(SprintStatus::Active);
        let lanes = board.lanes();

        assert_eq!(board.issues().len(), 3);
        assert_eq!(lanes.len(), 4);
        assert_eq!(lanes[0].column.name, "Todo");
        assert_eq!(lanes[0].issues.len(), 2);
        assert_eq!(lanes[1].issues[0].title, "C");
        assert!(lanes[3].issues.is_empty());
    }

    #[test]
    fn test_board_apply_move() {
        let mut board = board_with(SprintStatus::Active);
        let a = board.lane(IssueStatus::Todo)[0].id;

        let noop = IssueMove::new(a, IssueStatus::Todo, IssueStatus::Todo, 0);
        assert!(!board.apply_move(&noop).unwrap());

        let mv = IssueMove::new(a, IssueStatus::Todo, IssueStatus::InProgress, 1);
        assert!(board.apply_move(&mv).unwrap());
        assert_eq!(board.lane(IssueStatus::Todo).len(), 1);
        assert_eq!(board.lane(IssueStatus::InProgress)[1].id, a);
        assert!(lanes_dense(board.issues()));
        assert_eq!(board.order_updates().len(), 3);
    }

    #[test]
    fn test_board_locked_unless_active() {
        for status in [SprintStatus::Planned, SprintStatus::Completed] {
            let mut board = board_with(status);
            let a = board.lane(IssueStatus::Todo)[0].id;
            let mv = IssueMove::new(a, IssueStatus::Todo, IssueStatus::Done, 0);

            assert!(board.is_locked());
            assert!(matches!(
                board.apply_move(&mv),
                Err(SprintboardError::SprintNotActive(_))
            ));
        }
        assert!(!board_with(SprintStatus::Completed).can_create_issue());
        assert!(board_with(SprintStatus::Planned).can_create_issue());
    }

    #[test]
    fn test_board_replace_issue() {
        let mut board = board_with(SprintStatus::Active);
        let mut updated = board.lane(IssueStatus::InProgress)[0].clone();
        updated.title = "C renamed".to_string();

        board.replace_issue(updated);
        assert_eq!(board.lane(IssueStatus::InProgress)[0].title, "C renamed");
    }

    proptest! {
        #[test]
        fn prop_lanes_stay_dense(
            lane_sizes in proptest::collection::vec(0usize..5, 4),
            moves in proptest::collection::vec((0usize..64, 0usize..4, 0usize..8), 0..24),
        ) {
            let mut issues = Vec::new();
            for (status, size) in IssueStatus::ALL.iter().zip(lane_sizes.iter()) {
                for order in 0..*size {
                    issues.push(issue(&format!("{}-{}", status.as_str(), order), *status, order as u32));
                }
            }
            let total = issues.len();

            for (pick, to, index) in moves {
                if issues.is_empty() {
                    break;
                }
                let chosen = &issues[pick % issues.len()];
                let mv = IssueMove::new(chosen.id, chosen.status, IssueStatus::ALL[to], index);
                issues = reorder(&issues, &mv).unwrap();
                prop_assert!(lanes_dense(&issues));
            }

            prop_assert_eq!(issues.len(), total);
        }
    }
}

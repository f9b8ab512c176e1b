//! Pure read views over a materialized projection.
//!
//! dep_state: per-item dependency label (ready / waiting_on_deps /
//! blocked_manual / n/a)
//! ready / blocked / status_counts: derived listings, no side effects

use serde::Serialize;

use super::domain::Status;
use super::identity::ItemId;
use super::item::Item;
use super::state::PlanState;

/// Derived per-item dependency label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepState {
    Ready,
    WaitingOnDeps,
    BlockedManual,
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl DepState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::WaitingOnDeps => "waiting_on_deps",
            Self::BlockedManual => "blocked_manual",
            Self::NotApplicable => "n/a",
        }
    }
}

/// Dependency ids of `item` whose target is missing or not `completed`,
/// deduplicated, in edge order.
pub fn unresolved_dependency_ids(item: &Item, state: &PlanState) -> Vec<ItemId> {
    let mut unresolved: Vec<ItemId> = Vec::new();
    for dep in &item.deps {
        let settled = state
            .get(&dep.id)
            .is_some_and(|target| target.status == Status::Completed);
        if !settled && !unresolved.contains(&dep.id) {
            unresolved.push(dep.id.clone());
        }
    }
    unresolved
}

/// Per-item dependency label:
/// - `blocked_manual` when the item itself is `blocked`
/// - `n/a` for settled statuses (`completed`/`deferred`/`canceled`)
/// - `waiting_on_deps` when any dependency target is not `completed`
/// - `ready` otherwise
pub fn dependency_state(item: &Item, state: &PlanState) -> DepState {
    if item.status == Status::Blocked {
        return DepState::BlockedManual;
    }
    if item.status.is_settled() {
        return DepState::NotApplicable;
    }
    if unresolved_dependency_ids(item, state).is_empty() {
        DepState::Ready
    } else {
        DepState::WaitingOnDeps
    }
}

/// An item together with its derived dependency fields, the row shape
/// consumed by external renderers and the translation contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: Item,
    pub dep_state: DepState,
    pub waiting_on: Vec<ItemId>,
}

impl EnrichedItem {
    fn derive(item: &Item, state: &PlanState) -> Self {
        Self {
            item: item.clone(),
            dep_state: dependency_state(item, state),
            waiting_on: unresolved_dependency_ids(item, state),
        }
    }
}

/// All items enriched with dependency state, in projection order.
pub fn enrich(state: &PlanState) -> Vec<EnrichedItem> {
    state
        .iter()
        .map(|item| EnrichedItem::derive(item, state))
        .collect()
}

/// One enriched item by id.
pub fn find_item(state: &PlanState, id: &ItemId) -> Option<EnrichedItem> {
    state.get(id).map(|item| EnrichedItem::derive(item, state))
}

/// Pending items whose dependencies are all completed.
pub fn ready_items(state: &PlanState) -> Vec<EnrichedItem> {
    enrich(state)
        .into_iter()
        .filter(|row| row.item.status == Status::Pending && row.dep_state == DepState::Ready)
        .collect()
}

/// Manually blocked items, plus pending items waiting on dependencies.
pub fn blocked_items(state: &PlanState) -> Vec<EnrichedItem> {
    enrich(state)
        .into_iter()
        .filter(|row| {
            row.item.status == Status::Blocked
                || (row.item.status == Status::Pending
                    && row.dep_state == DepState::WaitingOnDeps)
        })
        .collect()
}

/// Histogram over the six statuses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
    pub deferred: usize,
    pub canceled: usize,
}

impl StatusCounts {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Pending => self.pending,
            Status::InProgress => self.in_progress,
            Status::Completed => self.completed,
            Status::Blocked => self.blocked,
            Status::Deferred => self.deferred,
            Status::Canceled => self.canceled,
        }
    }

    pub fn total(&self) -> usize {
        Status::ALL.iter().map(|status| self.get(*status)).sum()
    }
}

pub fn status_counts(state: &PlanState) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for item in state {
        match item.status {
            Status::Pending => counts.pending += 1,
            Status::InProgress => counts.in_progress += 1,
            Status::Completed => counts.completed += 1,
            Status::Blocked => counts.blocked += 1,
            Status::Deferred => counts.deferred += 1,
            Status::Canceled => counts.canceled += 1,
        }
    }
    counts
}

/// Compact plan summary: histogram plus derived ready/blocked totals and the
/// active item, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: usize,
    pub ready: usize,
    pub blocked_or_waiting: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_id: Option<ItemId>,
}

pub fn summarize(state: &PlanState) -> PlanSummary {
    let counts = status_counts(state);
    PlanSummary {
        counts,
        total: state.len(),
        ready: ready_items(state).len(),
        blocked_or_waiting: blocked_items(state).len(),
        in_progress_id: state
            .iter()
            .find(|item| item.status == Status::InProgress)
            .map(|item| item.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(items: serde_json::Value) -> PlanState {
        let items = items
            .as_array()
            .unwrap()
            .iter()
            .map(|raw| Item::from_value(raw).unwrap());
        PlanState::from_items(items)
    }

    fn id(s: &str) -> ItemId {
        ItemId::parse(s).unwrap()
    }

    #[test]
    fn dep_state_matrix() {
        let state = state(json!([
            {"id": "done", "step": "d", "status": "completed", "deps": []},
            {"id": "open", "step": "o", "status": "pending", "deps": []},
            {"id": "waiting", "step": "w", "status": "pending", "deps": ["open"]},
            {"id": "manual", "step": "m", "status": "blocked", "deps": []},
            {"id": "parked", "step": "p", "status": "deferred", "deps": ["open"]},
        ]));

        let label = |raw: &str| dependency_state(state.get(&id(raw)).unwrap(), &state);
        assert_eq!(label("done"), DepState::NotApplicable);
        assert_eq!(label("open"), DepState::Ready);
        assert_eq!(label("waiting"), DepState::WaitingOnDeps);
        assert_eq!(label("manual"), DepState::BlockedManual);
        assert_eq!(label("parked"), DepState::NotApplicable);
    }

    #[test]
    fn missing_dep_target_counts_as_unresolved() {
        let state = state(json!([
            {"id": "a", "step": "x", "status": "pending", "deps": ["ghost", "ghost"]},
        ]));
        let unresolved = unresolved_dependency_ids(state.get(&id("a")).unwrap(), &state);
        assert_eq!(unresolved, vec![id("ghost")]);
    }

    #[test]
    fn ready_and_blocked_listings() {
        let state = state(json!([
            {"id": "base", "step": "b", "status": "completed", "deps": []},
            {"id": "go", "step": "g", "status": "pending", "deps": ["base"]},
            {"id": "wait", "step": "w", "status": "pending", "deps": ["go"]},
            {"id": "stuck", "step": "s", "status": "blocked", "deps": []},
        ]));

        let ready_rows = ready_items(&state);
        let ready: Vec<&str> = ready_rows
            .iter()
            .map(|row| row.item.id.as_str())
            .collect();
        assert_eq!(ready, ["go"]);

        let blocked_rows = blocked_items(&state);
        let blocked: Vec<&str> = blocked_rows
            .iter()
            .map(|row| row.item.id.as_str())
            .collect();
        assert_eq!(blocked, ["wait", "stuck"]);
    }

    #[test]
    fn counts_and_summary() {
        let state = state(json!([
            {"id": "a", "step": "a", "status": "completed", "deps": []},
            {"id": "b", "step": "b", "status": "in_progress", "deps": ["a"]},
            {"id": "c", "step": "c", "status": "pending", "deps": ["b"]},
        ]));
        let counts = status_counts(&state);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 3);

        let summary = summarize(&state);
        assert_eq!(summary.ready, 0);
        assert_eq!(summary.blocked_or_waiting, 1);
        assert_eq!(summary.in_progress_id, Some(id("b")));
    }

    #[test]
    fn enriched_row_serializes_flat() {
        let state = state(json!([
            {"id": "a", "step": "x", "status": "pending", "deps": []},
        ]));
        let rows = enrich(&state);
        let value = serde_json::to_value(&rows).unwrap();
        assert_eq!(value[0]["id"], "a");
        assert_eq!(value[0]["dep_state"], "ready");
        assert_eq!(value[0]["waiting_on"], json!([]));
    }
}

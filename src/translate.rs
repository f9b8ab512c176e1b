//! Translation of enriched plan rows into an external planner's
//! `{step, status}` entries.
//!
//! The consumer's status vocabulary is the binary-ish
//! `pending | in_progress | completed`: every internal status other than
//! those two collapses to `pending`, and an item still waiting on
//! dependencies is forced back to `pending` even when marked active.
//!
//! Input rows are loosely-typed JSON objects (the shape external consumers
//! hold after serialization), so rejection is part of the contract: a row
//! without a string `step` or with an unrecognized `status` is an error.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::views::{DepState, EnrichedItem, enrich};
use crate::core::{PlanState, Status};

/// Collapsed status vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    fn collapse(status: Status) -> Self {
        match status {
            Status::InProgress => Self::InProgress,
            Status::Completed => Self::Completed,
            _ => Self::Pending,
        }
    }
}

/// One entry of the external plan payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub step: String,
    pub status: PlanStatus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TranslateError {
    #[error("item {index} missing string step")]
    MissingStep { index: usize },

    #[error("item {index} missing string status")]
    MissingStatus { index: usize },

    #[error("item {index} has invalid status '{raw}'")]
    InvalidStatus { index: usize, raw: String },

    #[error("drift: item count mismatch between items and plan entries")]
    CountDrift,

    #[error(
        "drift: mapped entry mismatch at index {index} \
         (expected step={expected_step:?}, status={expected_status:?}; \
         got step={step:?}, status={status:?})"
    )]
    EntryDrift {
        index: usize,
        expected_step: String,
        expected_status: String,
        step: Option<String>,
        status: Option<String>,
    },
}

/// Map loosely-typed enriched rows into plan entries, in the same order.
pub fn build_plan(rows: &[Value]) -> Result<Vec<PlanEntry>, TranslateError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let step = row
                .get("step")
                .and_then(Value::as_str)
                .ok_or(TranslateError::MissingStep { index })?;
            Ok(PlanEntry {
                step: step.to_string(),
                status: map_status(row, index)?,
            })
        })
        .collect()
}

fn map_status(row: &Value, index: usize) -> Result<PlanStatus, TranslateError> {
    let raw = row
        .get("status")
        .and_then(Value::as_str)
        .ok_or(TranslateError::MissingStatus { index })?;
    // Canonical statuses only here: alias normalization happened at the
    // ingestion boundary, so an alias this deep means a foreign producer.
    let key = raw.trim().to_ascii_lowercase();
    let status = Status::ALL
        .into_iter()
        .find(|status| status.as_str() == key)
        .ok_or_else(|| TranslateError::InvalidStatus {
            index,
            raw: raw.to_string(),
        })?;

    let mapped = PlanStatus::collapse(status);
    let waiting = row.get("dep_state").and_then(Value::as_str)
        == Some(DepState::WaitingOnDeps.as_str());
    if waiting && mapped == PlanStatus::InProgress {
        return Ok(PlanStatus::Pending);
    }
    Ok(mapped)
}

/// Typed fast path over a projection: enrich, then map. Cannot fail, since
/// enriched rows always carry a step and a canonical status.
pub fn plan_from_state(state: &PlanState) -> Vec<PlanEntry> {
    enrich(state).iter().map(entry_from_row).collect()
}

fn entry_from_row(row: &EnrichedItem) -> PlanEntry {
    let mut status = PlanStatus::collapse(row.item.status);
    if row.dep_state == DepState::WaitingOnDeps && status == PlanStatus::InProgress {
        status = PlanStatus::Pending;
    }
    PlanEntry {
        step: row.item.step.clone(),
        status,
    }
}

/// Complete payload for the external planner: `{"plan": [...]}`.
pub fn plan_payload(state: &PlanState) -> Value {
    serde_json::json!({ "plan": plan_from_state(state) })
}

/// Check a foreign entry list against the projection's expected mapping.
pub fn assert_no_drift(state: &PlanState, entries: &[Value]) -> Result<(), TranslateError> {
    let expected = plan_from_state(state);
    if expected.len() != entries.len() {
        return Err(TranslateError::CountDrift);
    }

    for (index, (want, got)) in expected.iter().zip(entries).enumerate() {
        let step = got.get("step").and_then(Value::as_str);
        let status = got.get("status").and_then(Value::as_str);
        if step != Some(want.step.as_str()) || status != Some(want.status.as_str()) {
            return Err(TranslateError::EntryDrift {
                index,
                expected_step: want.step.clone(),
                expected_status: want.status.as_str().to_string(),
                step: step.map(str::to_string),
                status: status.map(str::to_string),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Item;
    use serde_json::json;

    fn state(items: Value) -> PlanState {
        let items = items
            .as_array()
            .unwrap()
            .iter()
            .map(|raw| Item::from_value(raw).unwrap());
        PlanState::from_items(items)
    }

    #[test]
    fn collapses_statuses() {
        let rows = vec![
            json!({"step": "a", "status": "completed"}),
            json!({"step": "b", "status": "in_progress"}),
            json!({"step": "c", "status": "blocked"}),
            json!({"step": "d", "status": "deferred"}),
            json!({"step": "e", "status": "canceled"}),
            json!({"step": "f", "status": "pending"}),
        ];
        let statuses: Vec<PlanStatus> = build_plan(&rows)
            .unwrap()
            .into_iter()
            .map(|entry| entry.status)
            .collect();
        assert_eq!(
            statuses,
            [
                PlanStatus::Completed,
                PlanStatus::InProgress,
                PlanStatus::Pending,
                PlanStatus::Pending,
                PlanStatus::Pending,
                PlanStatus::Pending,
            ]
        );
    }

    #[test]
    fn waiting_on_deps_forces_pending() {
        let rows = vec![json!({
            "step": "x", "status": "in_progress", "dep_state": "waiting_on_deps",
        })];
        assert_eq!(build_plan(&rows).unwrap()[0].status, PlanStatus::Pending);

        // Completed stays completed even while flagged as waiting.
        let rows = vec![json!({
            "step": "x", "status": "completed", "dep_state": "waiting_on_deps",
        })];
        assert_eq!(build_plan(&rows).unwrap()[0].status, PlanStatus::Completed);
    }

    #[test]
    fn rejects_missing_step_and_bad_status() {
        let err = build_plan(&[json!({"status": "pending"})]).unwrap_err();
        assert_eq!(err, TranslateError::MissingStep { index: 0 });

        let err = build_plan(&[json!({"step": "x", "status": 7})]).unwrap_err();
        assert_eq!(err, TranslateError::MissingStatus { index: 0 });

        let err = build_plan(&[json!({"step": "x", "status": "paused"})]).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidStatus { index: 0, .. }));
    }

    #[test]
    fn typed_path_matches_loose_path() {
        let state = state(json!([
            {"id": "a", "step": "first", "status": "completed", "deps": []},
            {"id": "b", "step": "second", "status": "in_progress", "deps": ["a"]},
            {"id": "c", "step": "third", "status": "pending", "deps": ["b"]},
        ]));
        let rows: Vec<Value> = enrich(&state)
            .iter()
            .map(|row| serde_json::to_value(row).unwrap())
            .collect();
        assert_eq!(build_plan(&rows).unwrap(), plan_from_state(&state));
    }

    #[test]
    fn payload_preserves_order() {
        let state = state(json!([
            {"id": "a", "step": "first", "deps": []},
            {"id": "b", "step": "second", "deps": []},
        ]));
        let payload = plan_payload(&state);
        assert_eq!(payload["plan"][0]["step"], "first");
        assert_eq!(payload["plan"][1]["step"], "second");
    }

    #[test]
    fn drift_detection() {
        let state = state(json!([
            {"id": "a", "step": "first", "deps": []},
        ]));
        assert!(assert_no_drift(
            &state,
            &[json!({"step": "first", "status": "pending"})],
        )
        .is_ok());

        assert_eq!(
            assert_no_drift(&state, &[]).unwrap_err(),
            TranslateError::CountDrift
        );

        let err = assert_no_drift(
            &state,
            &[json!({"step": "first", "status": "completed"})],
        )
        .unwrap_err();
        assert!(matches!(err, TranslateError::EntryDrift { index: 0, .. }));
    }
}

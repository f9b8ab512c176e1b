//! Graph and lifecycle validation over a materialized projection.
//!
//! Checks, in order: referential integrity and self-loops, dependency
//! cycles, the single-active-item policy, and dependency-gated status
//! legality. All violations are collected, not just the first.

use std::collections::BTreeSet;

use thiserror::Error;

use super::domain::Status;
use super::identity::ItemId;
use super::state::PlanState;
use super::views::unresolved_dependency_ids;

/// One violated invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Violation {
    #[error("item '{item}' references unknown dependency '{dep}'")]
    UnknownDependency { item: ItemId, dep: ItemId },

    #[error("item '{item}' cannot depend on itself")]
    SelfDependency { item: ItemId },

    #[error("dependency cycle detected: {}", join_path(.path))]
    Cycle { path: Vec<ItemId> },

    #[error("multiple in_progress items found: {}", join_ids(.ids))]
    MultipleInProgress { ids: Vec<ItemId> },

    #[error("item '{item}' cannot be {status}; unresolved dependencies: {}", join_ids(.deps))]
    UnresolvedDependencies {
        item: ItemId,
        status: Status,
        deps: Vec<ItemId>,
    },
}

fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(ItemId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_path(path: &[ItemId]) -> String {
    path.iter()
        .map(ItemId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A projection that violates one or more invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", join_violations(.violations))]
pub struct StateInvalid {
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateOptions {
    /// Permit more than one `in_progress` item.
    pub allow_multiple_in_progress: bool,
}

/// Check every invariant; `Err` carries the full violation list.
pub fn validate_state(state: &PlanState, options: ValidateOptions) -> Result<(), StateInvalid> {
    let violations = check_state(state, options);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(StateInvalid { violations })
    }
}

/// Collect all violated invariants over the projection.
pub fn check_state(state: &PlanState, options: ValidateOptions) -> Vec<Violation> {
    let mut violations = Vec::new();

    for item in state {
        for dep in &item.deps {
            if dep.id == item.id {
                let violation = Violation::SelfDependency {
                    item: item.id.clone(),
                };
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            } else if !state.contains(&dep.id) {
                let violation = Violation::UnknownDependency {
                    item: item.id.clone(),
                    dep: dep.id.clone(),
                };
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }
    }

    if let Some(path) = find_cycle(state) {
        violations.push(Violation::Cycle { path });
    }

    if !options.allow_multiple_in_progress {
        let active: Vec<ItemId> = state
            .iter()
            .filter(|item| item.status == Status::InProgress)
            .map(|item| item.id.clone())
            .collect();
        if active.len() > 1 {
            violations.push(Violation::MultipleInProgress { ids: active });
        }
    }

    for item in state {
        if !matches!(item.status, Status::InProgress | Status::Completed) {
            continue;
        }
        let unresolved = unresolved_dependency_ids(item, state);
        if !unresolved.is_empty() {
            violations.push(Violation::UnresolvedDependencies {
                item: item.id.clone(),
                status: item.status,
                deps: unresolved,
            });
        }
    }

    violations
}

/// Iterative depth-first search for a dependency cycle.
///
/// An explicit frame stack replaces recursion so arbitrarily deep graphs
/// cannot overflow. On revisiting a node already on the current path, the
/// reported cycle is the path slice from that node's first occurrence back
/// to itself. Edges to missing ids are skipped here; referential checks
/// report them separately.
fn find_cycle(state: &PlanState) -> Option<Vec<ItemId>> {
    let mut done: BTreeSet<ItemId> = BTreeSet::new();

    for root in state.ids() {
        if done.contains(root) {
            continue;
        }

        // (node, next dep index to explore)
        let mut frames: Vec<(ItemId, usize)> = vec![(root.clone(), 0)];
        let mut on_path: BTreeSet<ItemId> = BTreeSet::from([root.clone()]);

        while let Some((node, cursor)) = frames.last().cloned() {
            let deps = state.get(&node).map(|item| &item.deps[..]).unwrap_or(&[]);

            let Some(dep) = deps.get(cursor) else {
                frames.pop();
                on_path.remove(&node);
                done.insert(node);
                continue;
            };
            if let Some(frame) = frames.last_mut() {
                frame.1 += 1;
            }

            let next = &dep.id;
            if next == &node || done.contains(next) || !state.contains(next) {
                continue;
            }
            if on_path.contains(next) {
                let start = frames
                    .iter()
                    .position(|(id, _)| id == next)
                    .unwrap_or(0);
                let mut path: Vec<ItemId> =
                    frames[start..].iter().map(|(id, _)| id.clone()).collect();
                path.push(next.clone());
                return Some(path);
            }
            on_path.insert(next.clone());
            frames.push((next.clone(), 0));
        }
    }

    None
}

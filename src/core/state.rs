//! The materialized projection: an insertion-ordered item map.
//!
//! The projection is always a disposable cache rebuilt by folding the record
//! sequence left-to-right in a single pass. The log file is the sole source
//! of truth.

use thiserror::Error;

use super::identity::ItemId;
use super::item::Item;
use super::record::{EventOp, Record, RecordBody};

/// Ordered item-id -> item projection. Insertion order is meaningful and is
/// preserved across upserts; `replace` and checkpoint snapshots reset it to
/// the snapshot's order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlanState {
    items: Vec<Item>,
}

impl PlanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot item list; a repeated id keeps its first
    /// position and takes the later definition.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut state = Self::new();
        for item in items {
            state.upsert(item);
        }
        state
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Insert or overwrite by id, keeping the existing position on overwrite.
    pub fn upsert(&mut self, item: Item) {
        match self.get_mut(&item.id) {
            Some(slot) => *slot = item,
            None => self.items.push(item),
        }
    }

    /// Delete by id; no-op when absent.
    pub fn remove(&mut self, id: &ItemId) -> Option<Item> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Next free auto id (`pl-NNN`).
    pub fn next_id(&self) -> ItemId {
        ItemId::next_auto(self.ids())
    }

    /// Fold one event op into the projection.
    pub fn apply_event(&mut self, op: &EventOp) -> Result<(), ApplyError> {
        self.apply_op(op)
    }

    /// Fold one record into the projection.
    pub fn apply(&mut self, record: &Record) -> Result<(), ApplyError> {
        match &record.body {
            RecordBody::Checkpoint { items, .. } => {
                *self = Self::from_items(items.iter().cloned());
                Ok(())
            }
            RecordBody::EventV2 { op } | RecordBody::EventV3 { op, .. } => self.apply_op(op),
        }
    }

    fn apply_op(&mut self, op: &EventOp) -> Result<(), ApplyError> {
        match op {
            EventOp::Init => Ok(()),
            EventOp::Replace { items } => {
                *self = Self::from_items(items.iter().cloned());
                Ok(())
            }
            EventOp::Upsert { item } => {
                self.upsert((**item).clone());
                Ok(())
            }
            EventOp::SetStatus { id, status } => {
                self.require(id, "set_status")?.status = *status;
                Ok(())
            }
            EventOp::SetDeps { id, deps } => {
                self.require(id, "set_deps")?.deps = deps.clone();
                Ok(())
            }
            EventOp::SetNotes { id, notes } => {
                self.require(id, "set_notes")?.notes = notes.clone();
                Ok(())
            }
            EventOp::AddComment { id, comment } => {
                self.require(id, "add_comment")?
                    .comments
                    .push(comment.clone());
                Ok(())
            }
            EventOp::Remove { id } => {
                self.remove(id);
                Ok(())
            }
        }
    }

    fn require(&mut self, id: &ItemId, op: &'static str) -> Result<&mut Item, ApplyError> {
        self.get_mut(id).ok_or_else(|| ApplyError::UnknownId {
            op,
            id: id.clone(),
        })
    }
}

impl<'a> IntoIterator for &'a PlanState {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Replay failure for a single record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("{op} references unknown id '{id}'")]
    UnknownId { op: &'static str, id: ItemId },
}

/// Replay failure with the 1-based position of the offending record.
#[derive(Debug, Error)]
#[error("record {index}: {source}")]
pub struct MaterializeError {
    pub index: usize,
    #[source]
    pub source: ApplyError,
}

/// Fold a record sequence into a projection: one linear pass, no
/// backtracking. A checkpoint record resets the projection to its snapshot
/// and subsequent records fold on top of it.
pub fn materialize(records: &[Record]) -> Result<PlanState, MaterializeError> {
    let mut state = PlanState::new();
    for (index, record) in records.iter().enumerate() {
        state
            .apply(record)
            .map_err(|source| MaterializeError {
                index: index + 1,
                source,
            })?;
    }
    Ok(state)
}

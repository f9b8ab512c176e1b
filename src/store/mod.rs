//! The durable side: log file IO and the mutation pipeline.
//!
//! Every mutation runs load -> materialize -> validate current -> apply the
//! proposed ops in memory -> validate proposed -> append -> maybe append a
//! checkpoint, all under one exclusive advisory lock. Appends are the only
//! writes; the file is never rewritten in place.

mod lock;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::Result;
use crate::config::{StoreConfig, default_author};
use crate::core::error::{CoreError, EmptyField};
use crate::core::record::{RecordError, SCHEMA_V3};
use crate::core::validate::{ValidateOptions, validate_state};
use crate::core::{
    Comment, DepEdge, EnrichedItem, EventOp, Item, ItemId, PlanState, Record, Status,
    StatusCounts, materialize, now_utc_iso, views,
};

pub use lock::{LockError, LogLock};

/// Resource and stream-integrity failures around the log file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot append to {path:?}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid record at line {line}: expected object")]
    ExpectedObject { line: usize },
    #[error("record {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: RecordError,
    },
    #[error("invalid stream: v2 record found after v3 record (record {index})")]
    GenerationOrder { index: usize },
    #[error("unknown id '{id}'")]
    UnknownId { id: ItemId },
    #[error("snapshot must be an array of items or object with items")]
    SnapshotShape,
    #[error("duplicate item id in snapshot: '{id}'")]
    DuplicateId { id: ItemId },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// A new item heading into [`PlanStore::add`]. Without an explicit id the
/// store assigns the next `pl-NNN`.
#[derive(Clone, Debug)]
pub struct ItemDraft {
    pub id: Option<ItemId>,
    pub step: String,
    pub status: Status,
    pub deps: Vec<DepEdge>,
}

impl ItemDraft {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            id: None,
            step: step.into(),
            status: Status::Pending,
            deps: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_deps(mut self, deps: Vec<DepEdge>) -> Self {
        self.deps = deps;
        self
    }
}

/// Handle on one plan log. Cheap to construct; every operation re-reads the
/// file, so the handle carries no cached state.
#[derive(Clone, Debug)]
pub struct PlanStore {
    config: StoreConfig,
}

impl PlanStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Default configuration over an explicit path.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(path))
    }

    /// Configuration from environment overrides.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(StoreConfig::from_env()?))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn options(&self) -> ValidateOptions {
        ValidateOptions {
            allow_multiple_in_progress: self.config.allow_multiple_in_progress,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The decoded record sequence, oldest first.
    pub fn read_records(&self) -> Result<Vec<Record>> {
        read_log(self.path())
    }

    /// Materialized projection, without invariant validation.
    pub fn load(&self) -> Result<PlanState> {
        let records = self.read_records()?;
        Ok(materialize(&records)?)
    }

    /// Materialized projection, validated against every invariant.
    pub fn load_validated(&self) -> Result<PlanState> {
        let state = self.load()?;
        validate_state(&state, self.options())?;
        Ok(state)
    }

    /// Validated projection as canonical snapshot items (export).
    pub fn snapshot(&self) -> Result<Vec<Item>> {
        Ok(self.load_validated()?.into_items())
    }

    /// All items enriched with dependency state.
    pub fn enriched(&self) -> Result<Vec<EnrichedItem>> {
        Ok(views::enrich(&self.load_validated()?))
    }

    /// Pending items whose dependencies are all completed.
    pub fn ready(&self) -> Result<Vec<EnrichedItem>> {
        Ok(views::ready_items(&self.load_validated()?))
    }

    /// Manually blocked items plus pending items waiting on dependencies.
    pub fn blocked(&self) -> Result<Vec<EnrichedItem>> {
        Ok(views::blocked_items(&self.load_validated()?))
    }

    /// Status histogram.
    pub fn counts(&self) -> Result<StatusCounts> {
        Ok(views::status_counts(&self.load_validated()?))
    }

    /// Histogram plus ready/blocked totals and the active item.
    pub fn summary(&self) -> Result<views::PlanSummary> {
        Ok(views::summarize(&self.load_validated()?))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create the log with an `init` record when missing or empty.
    /// Returns whether this call created it.
    pub fn init(&self) -> Result<bool> {
        let _lock = LogLock::acquire(self.path())?;
        let exists = fs::metadata(self.path())
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if exists {
            return Ok(false);
        }
        append_records(self.path(), &[Record::event(1, EventOp::Init)])?;
        info!(path = %self.path().display(), "initialized plan log");
        Ok(true)
    }

    /// Reset the plan to empty by appending a `replace` with no items.
    ///
    /// Skips current-state validation so a plan whose projection has become
    /// invalid can still be recovered by clearing it.
    pub fn clear(&self) -> Result<()> {
        let lock = LogLock::acquire(self.path())?;
        let mut records = read_log(self.path())?;
        self.append_events(&lock, &mut records, vec![EventOp::Replace { items: Vec::new() }])?;
        Ok(())
    }

    /// Add or overwrite one item. Without an explicit id, assigns the next
    /// auto id against the projection read under the lock.
    pub fn add(&self, draft: ItemDraft) -> Result<Item> {
        let ItemDraft {
            id: explicit_id,
            step,
            status,
            deps,
        } = draft;
        let step = step.trim().to_string();
        if step.is_empty() {
            return Err(CoreError::from(EmptyField::new("step")).into());
        }
        let deps = dedupe_edges(deps);
        self.mutate(move |state| {
            let id = match explicit_id {
                Some(id) => id,
                None => state.next_id(),
            };
            let item = Item::new(id, step, status, deps);
            Ok((
                vec![EventOp::Upsert {
                    item: Box::new(item.clone()),
                }],
                item,
            ))
        })
    }

    /// Set one item's status.
    pub fn set_status(&self, id: &ItemId, status: Status) -> Result<()> {
        self.mutate(|state| {
            require_known(state, id)?;
            Ok((
                vec![EventOp::SetStatus {
                    id: id.clone(),
                    status,
                }],
                (),
            ))
        })
    }

    /// Replace one item's dependency list.
    pub fn set_deps(&self, id: &ItemId, deps: Vec<DepEdge>) -> Result<()> {
        self.mutate(|state| {
            require_known(state, id)?;
            Ok((
                vec![EventOp::SetDeps {
                    id: id.clone(),
                    deps: dedupe_edges(deps),
                }],
                (),
            ))
        })
    }

    /// Replace one item's notes (empty string clears).
    pub fn set_notes(&self, id: &ItemId, notes: impl Into<String>) -> Result<()> {
        let notes = notes.into();
        self.mutate(|state| {
            require_known(state, id)?;
            Ok((
                vec![EventOp::SetNotes {
                    id: id.clone(),
                    notes,
                }],
                (),
            ))
        })
    }

    /// Append a comment, stamped now. Author defaults from the environment.
    pub fn add_comment(
        &self,
        id: &ItemId,
        author: Option<&str>,
        text: &str,
    ) -> Result<Comment> {
        let author = match author.map(str::trim) {
            Some(author) if !author.is_empty() => author.to_string(),
            _ => default_author(),
        };
        let comment = Comment::new(now_utc_iso(), author, text.trim())?;
        self.mutate(|state| {
            require_known(state, id)?;
            Ok((
                vec![EventOp::AddComment {
                    id: id.clone(),
                    comment: comment.clone(),
                }],
                comment.clone(),
            ))
        })
    }

    /// Remove one item.
    pub fn remove(&self, id: &ItemId) -> Result<()> {
        self.mutate(|state| {
            require_known(state, id)?;
            Ok((vec![EventOp::Remove { id: id.clone() }], ()))
        })
    }

    /// Import a snapshot (`[item, ...]` or `{items: [...]}`). With `replace`
    /// the projection is rebuilt from the snapshot; otherwise each item is
    /// upserted. Returns the number of imported items.
    pub fn import(&self, snapshot: &Value, replace: bool) -> Result<usize> {
        let items = parse_snapshot(snapshot)?;
        let count = items.len();
        self.mutate(move |_state| {
            let ops = if replace {
                vec![EventOp::Replace { items }]
            } else {
                items
                    .into_iter()
                    .map(|item| EventOp::Upsert {
                        item: Box::new(item),
                    })
                    .collect()
            };
            Ok((ops, count))
        })
    }

    /// The shared pipeline: lock, load, validate current, build ops, apply
    /// them to a working copy, validate the proposal, then append. Nothing
    /// is appended on any failure.
    fn mutate<T>(
        &self,
        build: impl FnOnce(&PlanState) -> Result<(Vec<EventOp>, T)>,
    ) -> Result<T> {
        let lock = LogLock::acquire(self.path())?;
        let mut records = read_log(self.path())?;
        let state = materialize(&records)?;
        validate_state(&state, self.options())?;

        let (ops, output) = build(&state)?;

        let mut proposed = state.clone();
        for op in &ops {
            proposed.apply_event(op)?;
        }
        validate_state(&proposed, self.options())?;

        self.append_events(&lock, &mut records, ops)?;
        Ok(output)
    }

    /// Append one event record per op, then a checkpoint when due.
    fn append_events(
        &self,
        _lock: &LogLock,
        records: &mut Vec<Record>,
        ops: Vec<EventOp>,
    ) -> Result<()> {
        let mut next_seq = latest_seq(records) + 1;
        let mut batch = Vec::with_capacity(ops.len());
        for op in ops {
            batch.push(Record::event(next_seq, op));
            next_seq += 1;
        }
        append_records(self.path(), &batch)?;
        debug!(
            path = %self.path().display(),
            appended = batch.len(),
            "appended event records"
        );
        records.extend(batch);

        if needs_checkpoint(records, self.config.checkpoint_interval) {
            let state = materialize(records)?;
            validate_state(&state, self.options())?;
            let checkpoint = Record::checkpoint(latest_seq(records), state.into_items());
            append_records(self.path(), std::slice::from_ref(&checkpoint))?;
            info!(
                path = %self.path().display(),
                seq = checkpoint.seq(),
                "appended checkpoint"
            );
            records.push(checkpoint);
        }
        Ok(())
    }
}

fn require_known(state: &PlanState, id: &ItemId) -> Result<()> {
    if !state.contains(id) {
        return Err(StoreError::UnknownId { id: id.clone() }.into());
    }
    Ok(())
}

fn dedupe_edges(deps: Vec<DepEdge>) -> Vec<DepEdge> {
    let mut unique: Vec<DepEdge> = Vec::with_capacity(deps.len());
    for dep in deps {
        if !unique.contains(&dep) {
            unique.push(dep);
        }
    }
    unique
}

/// Decode a snapshot into canonical items, rejecting duplicate ids.
fn parse_snapshot(snapshot: &Value) -> Result<Vec<Item>> {
    let raw_items = match snapshot {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(StoreError::SnapshotShape.into()),
        },
        _ => return Err(StoreError::SnapshotShape.into()),
    };

    let mut items: Vec<Item> = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let item = Item::from_value(raw)?;
        if items.iter().any(|seen| seen.id == item.id) {
            return Err(StoreError::DuplicateId { id: item.id }.into());
        }
        items.push(item);
    }
    Ok(items)
}

// =============================================================================
// Log file IO + checkpoint policy
// =============================================================================

/// Read and decode the whole log. A missing file is an empty log; `init`
/// creates it. Enforces the generation ordering: no v2 record may follow a
/// v3 record.
pub fn read_log(path: &Path) -> Result<Vec<Record>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let mut records = Vec::new();
    let mut saw_v3 = false;
    for (line_index, line) in text.lines().enumerate() {
        let line_number = line_index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let raw: Value = serde_json::from_str(trimmed).map_err(|source| StoreError::Parse {
            line: line_number,
            source,
        })?;
        if !raw.is_object() {
            return Err(StoreError::ExpectedObject { line: line_number }.into());
        }

        let index = records.len() + 1;
        let record = Record::decode(&raw).map_err(|source| StoreError::Record { index, source })?;

        match record.generation() {
            SCHEMA_V3 => saw_v3 = true,
            _ if saw_v3 => return Err(StoreError::GenerationOrder { index }.into()),
            _ => {}
        }
        records.push(record);
    }
    Ok(records)
}

/// Highest `seq` seen anywhere in the log (0 when none).
pub fn latest_seq(records: &[Record]) -> u64 {
    records.iter().filter_map(Record::seq).max().unwrap_or(0)
}

/// Whether the event tail since the most recent checkpoint (or log start)
/// has reached the interval.
pub fn needs_checkpoint(records: &[Record], interval: usize) -> bool {
    let mut events_since_checkpoint = 0;
    for record in records.iter().rev() {
        if record.is_checkpoint() {
            break;
        }
        events_since_checkpoint += 1;
    }
    events_since_checkpoint >= interval
}

fn append_records(path: &Path, records: &[Record]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let io_err = |source: io::Error| StoreError::Append {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut text = String::new();
    for record in records {
        text.push_str(&record.encode_line());
        text.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(text.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}

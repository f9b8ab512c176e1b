//! Wire records: the two on-disk schema generations and their codec.
//!
//! Generation A (`v: 2`): flat `{v, ts, op, ...}` event records.
//! Generation B (`v: 3`): `{v, ts, lane, seq?, ...}` with an `event` lane for
//! incremental ops and a `checkpoint` lane carrying a full item snapshot.
//!
//! Decoding is fail-closed: unknown ops, unknown schema versions, and shapes
//! that do not match their declared generation are errors, never skips.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::dep::DepEdge;
use super::domain::Status;
use super::error::{CoreError, WrongShape};
use super::identity::ItemId;
use super::item::{Comment, Item};
use super::time::now_utc_iso;

pub const SCHEMA_V2: u64 = 2;
pub const SCHEMA_V3: u64 = 3;

/// Generation B record discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Event,
    Checkpoint,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Checkpoint => "checkpoint",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "event" => Some(Self::Event),
            "checkpoint" => Some(Self::Checkpoint),
            _ => None,
        }
    }
}

/// Incremental event operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOp {
    Init,
    Replace { items: Vec<Item> },
    Upsert { item: Box<Item> },
    SetStatus { id: ItemId, status: Status },
    SetDeps { id: ItemId, deps: Vec<DepEdge> },
    SetNotes { id: ItemId, notes: String },
    AddComment { id: ItemId, comment: Comment },
    Remove { id: ItemId },
}

impl EventOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Replace { .. } => "replace",
            Self::Upsert { .. } => "upsert",
            Self::SetStatus { .. } => "set_status",
            Self::SetDeps { .. } => "set_deps",
            Self::SetNotes { .. } => "set_notes",
            Self::AddComment { .. } => "add_comment",
            Self::Remove { .. } => "remove",
        }
    }

    /// Ops introduced by Generation B; a v2 record carrying one is malformed.
    fn requires_v3(&self) -> bool {
        matches!(self, Self::SetNotes { .. } | Self::AddComment { .. })
    }
}

/// One decoded log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub ts: String,
    pub body: RecordBody,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordBody {
    /// Generation A event.
    EventV2 { op: EventOp },
    /// Generation B event lane.
    EventV3 { seq: Option<u64>, op: EventOp },
    /// Generation B checkpoint lane: full snapshot plus the seq of the last
    /// event it absorbs.
    Checkpoint { seq: Option<u64>, items: Vec<Item> },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("expected object")]
    NotObject,
    #[error("unsupported schema version '{raw}'")]
    UnsupportedVersion { raw: String },
    #[error("invalid lane '{raw}'")]
    InvalidLane { raw: String },
    #[error("record.seq must be a non-negative integer")]
    InvalidSeq,
    #[error("{op} requires 'items' array")]
    MissingItems { op: &'static str },
    #[error("unknown op '{raw}'")]
    UnknownOp { raw: String },
    #[error("op '{op}' requires schema v{SCHEMA_V3}")]
    OpRequiresV3 { op: &'static str },
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl Record {
    /// Build a Generation B event record stamped with the current time.
    pub fn event(seq: u64, op: EventOp) -> Self {
        Self {
            ts: now_utc_iso(),
            body: RecordBody::EventV3 { seq: Some(seq), op },
        }
    }

    /// Build a Generation B checkpoint record stamped with the current time.
    pub fn checkpoint(seq: u64, items: Vec<Item>) -> Self {
        Self {
            ts: now_utc_iso(),
            body: RecordBody::Checkpoint {
                seq: Some(seq),
                items,
            },
        }
    }

    pub fn generation(&self) -> u64 {
        match self.body {
            RecordBody::EventV2 { .. } => SCHEMA_V2,
            RecordBody::EventV3 { .. } | RecordBody::Checkpoint { .. } => SCHEMA_V3,
        }
    }

    pub fn seq(&self) -> Option<u64> {
        match self.body {
            RecordBody::EventV2 { .. } => None,
            RecordBody::EventV3 { seq, .. } | RecordBody::Checkpoint { seq, .. } => seq,
        }
    }

    pub fn is_checkpoint(&self) -> bool {
        matches!(self.body, RecordBody::Checkpoint { .. })
    }

    /// Decode one raw record. The declared `v` tag selects the generation
    /// dispatch; a shape that does not match its generation is an error.
    pub fn decode(raw: &Value) -> Result<Self, RecordError> {
        let Value::Object(map) = raw else {
            return Err(RecordError::NotObject);
        };

        let version = match map.get("v").and_then(Value::as_u64) {
            Some(v) if v == SCHEMA_V2 || v == SCHEMA_V3 => v,
            _ => {
                return Err(RecordError::UnsupportedVersion {
                    raw: display_raw(map.get("v")),
                });
            }
        };

        let ts = map
            .get("ts")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if version == SCHEMA_V2 {
            let op = decode_op(map)?;
            if op.requires_v3() {
                return Err(RecordError::OpRequiresV3 { op: op.name() });
            }
            return Ok(Self {
                ts,
                body: RecordBody::EventV2 { op },
            });
        }

        // Older v3 writers tagged the discriminator `kind` instead of `lane`.
        let lane_raw = map.get("lane").or_else(|| map.get("kind"));
        let lane = lane_raw
            .and_then(Value::as_str)
            .and_then(Lane::parse)
            .ok_or_else(|| RecordError::InvalidLane {
                raw: display_raw(lane_raw),
            })?;

        let seq = decode_seq(map.get("seq"))?;

        let body = match lane {
            Lane::Checkpoint => RecordBody::Checkpoint {
                seq,
                items: decode_items(map.get("items"), "checkpoint")?,
            },
            Lane::Event => RecordBody::EventV3 {
                seq,
                op: decode_op(map)?,
            },
        };
        Ok(Self { ts, body })
    }

    /// Encode as one compact JSON log line (no trailing newline).
    pub fn encode_line(&self) -> String {
        let mut wire = WireRecord {
            v: self.generation(),
            ts: &self.ts,
            lane: None,
            seq: self.seq(),
            op: None,
            id: None,
            status: None,
            deps: None,
            notes: None,
            comment: None,
            item: None,
            items: None,
        };

        let op = match &self.body {
            RecordBody::EventV2 { op } => Some(op),
            RecordBody::EventV3 { op, .. } => {
                wire.lane = Some(Lane::Event.as_str());
                Some(op)
            }
            RecordBody::Checkpoint { items, .. } => {
                wire.lane = Some(Lane::Checkpoint.as_str());
                wire.items = Some(items);
                None
            }
        };

        if let Some(op) = op {
            wire.op = Some(op.name());
            match op {
                EventOp::Init => {}
                EventOp::Replace { items } => wire.items = Some(items),
                EventOp::Upsert { item } => wire.item = Some(item),
                EventOp::SetStatus { id, status } => {
                    wire.id = Some(id);
                    wire.status = Some(*status);
                }
                EventOp::SetDeps { id, deps } => {
                    wire.id = Some(id);
                    wire.deps = Some(deps);
                }
                EventOp::SetNotes { id, notes } => {
                    wire.id = Some(id);
                    wire.notes = Some(notes);
                }
                EventOp::AddComment { id, comment } => {
                    wire.id = Some(id);
                    wire.comment = Some(comment);
                }
                EventOp::Remove { id } => wire.id = Some(id),
            }
        }

        serde_json::to_string(&wire).unwrap_or_default()
    }
}

/// Flat superset of the wire fields, serialized in declaration order.
#[derive(Serialize)]
struct WireRecord<'a> {
    v: u64,
    ts: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lane: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    op: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deps: Option<&'a [DepEdge]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<&'a Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<&'a [Item]>,
}

fn decode_seq(raw: Option<&Value>) -> Result<Option<u64>, RecordError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or(RecordError::InvalidSeq),
    }
}

fn decode_items(raw: Option<&Value>, op: &'static str) -> Result<Vec<Item>, RecordError> {
    let Some(Value::Array(entries)) = raw else {
        return Err(RecordError::MissingItems { op });
    };
    entries
        .iter()
        .map(|entry| Item::from_value(entry).map_err(RecordError::from))
        .collect()
}

fn decode_op(map: &serde_json::Map<String, Value>) -> Result<EventOp, RecordError> {
    let op_raw = map
        .get("op")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim();

    let op_id = |field: &str| -> Result<ItemId, RecordError> {
        let raw = map.get("id").and_then(Value::as_str).unwrap_or_default();
        ItemId::parse_field(raw, field)
            .map_err(RecordError::from)
    };

    match op_raw {
        "init" => Ok(EventOp::Init),
        "replace" | "replace_all" => Ok(EventOp::Replace {
            items: decode_items(map.get("items"), "replace")?,
        }),
        "upsert" | "upsert_item" => {
            let item = Item::from_value(map.get("item").unwrap_or(&Value::Null))?;
            Ok(EventOp::Upsert {
                item: Box::new(item),
            })
        }
        "set_status" => Ok(EventOp::SetStatus {
            id: op_id("set_status id")?,
            status: Status::parse(map.get("status").and_then(Value::as_str).unwrap_or_default())?,
        }),
        "set_deps" => Ok(EventOp::SetDeps {
            id: op_id("set_deps id")?,
            deps: DepEdge::from_values(map.get("deps").unwrap_or(&Value::Null))?,
        }),
        "set_notes" => {
            let notes = match map.get("notes") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(
                        CoreError::from(WrongShape::new("item.notes", "must be a string")).into(),
                    );
                }
            };
            Ok(EventOp::SetNotes {
                id: op_id("set_notes id")?,
                notes,
            })
        }
        "add_comment" | "append_comment" | "comment" => {
            // Bare comment records inline ts/author/text at the top level.
            let comment = match map.get("comment") {
                Some(value) if !value.is_null() => Comment::from_value(value)?,
                _ => Comment::from_value(&Value::Object(inline_comment(map)))?,
            };
            Ok(EventOp::AddComment {
                id: op_id("add_comment id")?,
                comment,
            })
        }
        "remove" => Ok(EventOp::Remove {
            id: op_id("remove id")?,
        }),
        _ => Err(RecordError::UnknownOp {
            raw: op_raw.to_string(),
        }),
    }
}

fn inline_comment(map: &serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    let mut inline = serde_json::Map::new();
    for field in ["ts", "author", "text"] {
        if let Some(value) = map.get(field) {
            inline.insert(field.to_string(), value.clone());
        }
    }
    inline
}

fn display_raw(raw: Option<&Value>) -> String {
    match raw {
        None | Some(Value::Null) => String::from("none"),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

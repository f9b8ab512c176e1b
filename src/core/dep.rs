//! Dependency edges.
//!
//! A dependency edge is directed item -> target: the item cannot move to
//! `in_progress`/`completed` until the target is `completed`. Edges are
//! unique by (id, type); duplicates are dropped on ingestion, first
//! occurrence wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::DepType;
use super::error::{CoreError, EmptyField, WrongShape};
use super::identity::ItemId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepEdge {
    pub id: ItemId,
    #[serde(rename = "type", default)]
    pub dep_type: DepType,
}

impl DepEdge {
    pub fn new(id: ItemId, dep_type: DepType) -> Self {
        Self { id, dep_type }
    }

    pub fn blocks(id: ItemId) -> Self {
        Self::new(id, DepType::blocks())
    }

    /// Decode one wire edge: either a bare id string (implying `blocks`) or
    /// an object `{id, type}`.
    pub fn from_value(raw: &Value) -> Result<Self, CoreError> {
        match raw {
            Value::String(s) => {
                let id = ItemId::parse_field(s, "dependency id")?;
                Ok(Self::blocks(id))
            }
            Value::Object(map) => {
                let id_raw = map.get("id").and_then(Value::as_str).unwrap_or("");
                let id = ItemId::parse_field(id_raw, "dependency id")?;
                let dep_type = match map.get("type") {
                    None | Some(Value::Null) => DepType::blocks(),
                    Some(Value::String(s)) => DepType::parse(s)?,
                    Some(_) => {
                        return Err(WrongShape::new("dependency type", "must be a string").into());
                    }
                };
                Ok(Self::new(id, dep_type))
            }
            _ => Err(WrongShape::new("dependency edges", "must be objects with {id,type}").into()),
        }
    }

    /// Decode a wire `deps` array, dropping duplicate (id, type) pairs.
    pub fn from_values(raw: &Value) -> Result<Vec<Self>, CoreError> {
        let Value::Array(entries) = raw else {
            return Err(WrongShape::new("item.deps", "must be an array").into());
        };
        let mut deps = Vec::with_capacity(entries.len());
        for entry in entries {
            push_unique(&mut deps, Self::from_value(entry)?);
        }
        Ok(deps)
    }

    /// Parse a comma-separated dependency list of `id` or `id:type` tokens.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, CoreError> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut deps = Vec::new();
        for token in text.split(',') {
            let part = token.trim();
            if part.is_empty() {
                return Err(EmptyField::new("dependency token").into());
            }
            let edge = match part.split_once(':') {
                Some((id_raw, type_raw)) => Self::new(
                    ItemId::parse_field(id_raw, "dependency id")?,
                    DepType::parse(type_raw)?,
                ),
                None => Self::blocks(ItemId::parse_field(part, "dependency id")?),
            };
            push_unique(&mut deps, edge);
        }
        Ok(deps)
    }

    /// Compact `id` / `id:type` token, the inverse of [`DepEdge::parse_list`].
    pub fn token(&self) -> String {
        if self.dep_type.is_blocks() {
            self.id.to_string()
        } else {
            format!("{}:{}", self.id, self.dep_type)
        }
    }
}

fn push_unique(deps: &mut Vec<DepEdge>, edge: DepEdge) {
    if !deps.contains(&edge) {
        deps.push(edge);
    }
}

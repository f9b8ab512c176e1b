//! Plan items and their canonical wire decoding.
//!
//! Item: id + step + status + deps + notes + comments
//! Comment: immutable, append-only per item
//!
//! Producers must send an explicit `deps` array (possibly empty); a missing
//! key is a validation error so dependency intent is never implicit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dep::DepEdge;
use super::domain::Status;
use super::error::{CoreError, EmptyField, WrongShape};
use super::identity::ItemId;

/// Immutable comment on an item. Once appended, never changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub ts: String,
    pub author: String,
    pub text: String,
}

impl Comment {
    pub fn new(
        ts: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let comment = Self {
            ts: ts.into().trim().to_string(),
            author: author.into().trim().to_string(),
            text: text.into().trim().to_string(),
        };
        comment.check()?;
        Ok(comment)
    }

    /// Decode one wire comment object, requiring all three fields non-empty.
    pub fn from_value(raw: &Value) -> Result<Self, CoreError> {
        let Value::Object(map) = raw else {
            return Err(WrongShape::new("item.comments entries", "must be objects").into());
        };
        Self::new(
            field_string(map.get("ts"), "comment.ts")?,
            field_string(map.get("author"), "comment.author")?,
            field_string(map.get("text"), "comment.text")?,
        )
    }

    fn check(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("comment.ts", &self.ts),
            ("comment.author", &self.author),
            ("comment.text", &self.text),
        ] {
            if value.trim().is_empty() {
                return Err(EmptyField::new(field).into());
            }
        }
        Ok(())
    }
}

/// A unit of work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub step: String,
    pub status: Status,
    pub deps: Vec<DepEdge>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Item {
    pub fn new(id: ItemId, step: impl Into<String>, status: Status, deps: Vec<DepEdge>) -> Self {
        Self {
            id,
            step: step.into(),
            status,
            deps,
            notes: String::new(),
            comments: Vec::new(),
        }
    }

    /// Decode one wire item into canonical form.
    ///
    /// Required: non-empty `id`, non-empty `step`, an explicit `deps` array.
    /// `status` defaults to `pending`; `notes`/`comments` default to empty.
    pub fn from_value(raw: &Value) -> Result<Self, CoreError> {
        let Value::Object(map) = raw else {
            return Err(WrongShape::new("item", "must be an object").into());
        };

        let id_raw = match map.get("id") {
            Some(Value::String(s)) => s.as_str(),
            _ => "",
        };
        let id = ItemId::parse_field(id_raw, "item.id")?;

        let step = field_string(map.get("step"), &format!("item '{id}' step"))?;

        let status = match map.get("status") {
            None | Some(Value::Null) => Status::Pending,
            Some(Value::String(s)) => Status::parse(s)?,
            Some(other) => Status::parse(&other.to_string())?,
        };

        let deps = match map.get("deps") {
            None => {
                return Err(
                    WrongShape::new(format!("item '{id}' deps"), "must be provided").into(),
                );
            }
            Some(raw_deps) => DepEdge::from_values(raw_deps)?,
        };

        let notes = match map.get("notes") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(WrongShape::new("item.notes", "must be a string").into()),
        };

        let comments = match map.get("comments") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(Comment::from_value)
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(WrongShape::new("item.comments", "must be an array").into()),
        };

        Ok(Self {
            id,
            step,
            status,
            deps,
            notes,
            comments,
        })
    }
}

fn field_string(raw: Option<&Value>, field: &str) -> Result<String, CoreError> {
    let text = match raw {
        Some(Value::String(s)) => s.trim(),
        _ => "",
    };
    if text.is_empty() {
        return Err(EmptyField::new(field).into());
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minimal_item() {
        let item = Item::from_value(&json!({
            "id": "pl-001",
            "step": "write the codec",
            "deps": [],
        }))
        .unwrap();
        assert_eq!(item.id.as_str(), "pl-001");
        assert_eq!(item.status, Status::Pending);
        assert!(item.deps.is_empty());
        assert!(item.notes.is_empty());
        assert!(item.comments.is_empty());
    }

    #[test]
    fn missing_deps_key_is_an_error() {
        let err = Item::from_value(&json!({"id": "pl-001", "step": "x"})).unwrap_err();
        assert!(err.to_string().contains("deps must be"));
    }

    #[test]
    fn status_aliases_normalize_on_decode() {
        let item = Item::from_value(&json!({
            "id": "pl-001",
            "step": "x",
            "status": "Done",
            "deps": [],
        }))
        .unwrap();
        assert_eq!(item.status, Status::Completed);
    }

    #[test]
    fn null_notes_reads_as_empty() {
        let item = Item::from_value(&json!({
            "id": "pl-001",
            "step": "x",
            "deps": [],
            "notes": null,
        }))
        .unwrap();
        assert_eq!(item.notes, "");
    }

    #[test]
    fn rejects_blank_step_and_id() {
        assert!(Item::from_value(&json!({"id": "pl-1", "step": "  ", "deps": []})).is_err());
        assert!(Item::from_value(&json!({"id": "", "step": "x", "deps": []})).is_err());
    }

    #[test]
    fn comment_fields_must_be_non_empty() {
        let err = Comment::from_value(&json!({"ts": "2026-08-06T00:00:00Z", "author": " ", "text": "hi"}))
            .unwrap_err();
        assert!(err.to_string().contains("comment.author"));
    }

    #[test]
    fn serializes_dep_type_as_type() {
        let item = Item::from_value(&json!({
            "id": "pl-001",
            "step": "x",
            "deps": [{"id": "pl-000", "type": "related"}],
        }))
        .unwrap();
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["deps"][0]["type"], "related");
        let back = Item::from_value(&value).unwrap();
        assert_eq!(back, item);
    }
}

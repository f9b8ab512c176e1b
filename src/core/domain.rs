//! Domain vocabulary.
//!
//! Status: closed lifecycle set with free-form input aliases
//! DepType: open set of kebab-case dependency relationship tokens

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidDepType, InvalidStatus};

/// Item lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Deferred,
    Canceled,
}

/// Input aliases accepted at the ingestion boundary, normalized before the
/// closed-set check.
const STATUS_ALIASES: [(&str, Status); 8] = [
    ("open", Status::Pending),
    ("queued", Status::Pending),
    ("active", Status::InProgress),
    ("doing", Status::InProgress),
    ("in-progress", Status::InProgress),
    ("done", Status::Completed),
    ("closed", Status::Completed),
    ("cancelled", Status::Canceled),
];

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Blocked,
        Status::Deferred,
        Status::Canceled,
    ];

    /// Normalize a raw status string: trim, lowercase, resolve aliases,
    /// then require membership in the closed set.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let key = raw.trim().to_ascii_lowercase();
        if let Some((_, status)) = STATUS_ALIASES.iter().find(|(alias, _)| *alias == key) {
            return Ok(*status);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == key)
            .ok_or_else(|| {
                InvalidStatus {
                    raw: raw.to_string(),
                    expected: Self::expected_list(),
                }
                .into()
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Deferred => "deferred",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal for dependency purposes: nothing is waiting on more work.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Deferred | Self::Canceled)
    }

    fn expected_list() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(Status::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default dependency relationship.
pub const DEFAULT_DEP_TYPE: &str = "blocks";

/// Dependency relationship token.
///
/// Open set: any lowercase kebab-case token is valid. Empty input falls back
/// to `blocks`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepType(String);

impl DepType {
    pub fn blocks() -> Self {
        Self(DEFAULT_DEP_TYPE.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let token = raw.trim().to_ascii_lowercase();
        if token.is_empty() {
            return Ok(Self::blocks());
        }
        if !is_kebab_token(&token) {
            return Err(InvalidDepType {
                raw: raw.to_string(),
            }
            .into());
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blocks(&self) -> bool {
        self.0 == DEFAULT_DEP_TYPE
    }
}

impl Default for DepType {
    fn default() -> Self {
        Self::blocks()
    }
}

impl fmt::Debug for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DepType({:?})", self.0)
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase alphanumeric segments joined by single hyphens.
fn is_kebab_token(s: &str) -> bool {
    !s.is_empty()
        && s.split('-')
            .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

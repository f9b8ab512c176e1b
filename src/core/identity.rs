//! Identity atoms.
//!
//! ItemId: plan item identifier, unique within a projection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, EmptyField};

/// Prefix used when generating item ids.
const AUTO_PREFIX: &str = "pl";

/// Legacy prefixes still recognized when scanning for the highest auto id.
const LEGACY_PREFIXES: [&str; 2] = ["st", "kt"];

/// Plan item identifier - non-empty, surrounding whitespace trimmed.
///
/// Ids are free-form; producers choose their own scheme. Auto-generated ids
/// use the `pl-NNN` form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        Self::parse_field(raw, "item.id")
    }

    /// Parse with a caller-supplied field name for error messages.
    pub fn parse_field(raw: impl AsRef<str>, field: &str) -> Result<Self, CoreError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EmptyField::new(field).into());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric suffix when the id is of the `pl-NNN` (or legacy `st-`/`kt-`)
    /// form, case-insensitive. Used to pick the next auto id.
    pub fn auto_seq(&self) -> Option<u32> {
        let (prefix, rest) = self.0.split_once('-')?;
        let prefix = prefix.to_ascii_lowercase();
        if prefix != AUTO_PREFIX && !LEGACY_PREFIXES.contains(&prefix.as_str()) {
            return None;
        }
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    }

    /// Build the auto id following the highest seen numeric suffix.
    pub fn next_auto<'a>(existing: impl Iterator<Item = &'a ItemId>) -> Self {
        let max_seen = existing.filter_map(ItemId::auto_seq).max().unwrap_or(0);
        Self(format!("{AUTO_PREFIX}-{:03}", max_seen + 1))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({:?})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

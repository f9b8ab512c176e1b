//! Core capability errors (field normalization and canonicalization).
//!
//! These are bounded and stable: they represent domain refusal states at the
//! ingestion boundary, not library implementation details.

use thiserror::Error;

/// Invalid identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} must be non-empty")]
pub struct EmptyField {
    pub field: String,
}

impl EmptyField {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Status string outside the closed set (after alias normalization).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid status '{raw}'; expected one of: {expected}")]
pub struct InvalidStatus {
    pub raw: String,
    pub expected: String,
}

/// Dependency type that is not a lowercase kebab-case token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid dependency type '{raw}'; expected kebab-case (e.g. 'blocks')")]
pub struct InvalidDepType {
    pub raw: String,
}

/// A field whose JSON shape does not match the canonical item schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} {expected}")]
pub struct WrongShape {
    pub field: String,
    pub expected: &'static str,
}

impl WrongShape {
    pub fn new(field: impl Into<String>, expected: &'static str) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }
}

/// Canonical error enum for the codec capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    Empty(#[from] EmptyField),
    #[error(transparent)]
    Status(#[from] InvalidStatus),
    #[error(transparent)]
    DepType(#[from] InvalidDepType),
    #[error(transparent)]
    Shape(#[from] WrongShape),
}

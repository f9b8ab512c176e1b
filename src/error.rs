//! Crate-level convenience error.
//!
//! Not a god error: a thin wrapper over the canonical capability errors so
//! callers can use one `Result` alias while matching on the capability when
//! they care.

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::error::CoreError;
use crate::core::state::{ApplyError, MaterializeError};
use crate::core::validate::StateInvalid;
use crate::store::{LockError, StoreError};
use crate::translate::TranslateError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Field normalization / canonicalization failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Log file resource or stream-integrity failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A single op could not be applied to the projection.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Replay of the record sequence failed.
    #[error(transparent)]
    Replay(#[from] MaterializeError),

    /// The projection violates graph or lifecycle invariants.
    #[error(transparent)]
    Invalid(#[from] StateInvalid),

    /// Consumer translation contract rejection.
    #[error(transparent)]
    Translate(#[from] TranslateError),
}

impl From<LockError> for Error {
    fn from(err: LockError) -> Self {
        Self::Store(StoreError::from(err))
    }
}

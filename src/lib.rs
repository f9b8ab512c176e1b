#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod translate;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::config::StoreConfig;
pub use crate::core::{
    Comment, DepEdge, DepState, DepType, EnrichedItem, EventOp, Item, ItemId, Lane, PlanState,
    Record, StateInvalid, Status, StatusCounts, ValidateOptions, Violation, materialize,
    validate_state,
};
pub use crate::store::{ItemDraft, PlanStore};

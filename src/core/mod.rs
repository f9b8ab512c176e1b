//! Pure domain layer: items, records, replay, validation, read views.
//!
//! Nothing in here touches the filesystem. The durable side lives in
//! `crate::store`.

pub mod dep;
pub mod domain;
pub mod error;
pub mod identity;
pub mod item;
pub mod record;
pub mod state;
pub mod time;
pub mod validate;
pub mod views;

pub use dep::DepEdge;
pub use domain::{DepType, Status};
pub use error::CoreError;
pub use identity::ItemId;
pub use item::{Comment, Item};
pub use record::{EventOp, Lane, Record, RecordBody, RecordError};
pub use state::{ApplyError, MaterializeError, PlanState, materialize};
pub use time::now_utc_iso;
pub use validate::{StateInvalid, ValidateOptions, Violation, check_state, validate_state};
pub use views::{DepState, EnrichedItem, PlanSummary, StatusCounts};

//! Store configuration: file path, checkpoint cadence, status policy.
//!
//! Environment overrides:
//! - `PLANLOG_FILE`: log file path (default `.planlog/plan.jsonl`)
//! - `PLANLOG_CHECKPOINT_INTERVAL`: events between checkpoints (default 50)
//! - `PLANLOG_AUTHOR`: default comment author, falling back to
//!   `USER`/`LOGNAME`, then `"unknown"`

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_FILE: &str = ".planlog/plan.jsonl";
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;

const FILE_ENV: &str = "PLANLOG_FILE";
const INTERVAL_ENV: &str = "PLANLOG_CHECKPOINT_INTERVAL";
const AUTHOR_ENV: &str = "PLANLOG_AUTHOR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {INTERVAL_ENV} '{raw}'; expected integer > 0")]
    InvalidInterval { raw: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Plan log path.
    pub path: PathBuf,
    /// Events since the last checkpoint before a new one is due.
    pub checkpoint_interval: usize,
    /// Permit more than one `in_progress` item.
    pub allow_multiple_in_progress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FILE),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            allow_multiple_in_progress: false,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Defaults plus environment overrides. An unparsable interval is a
    /// fatal configuration error, not a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = match env::var(FILE_ENV) {
            Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw),
            _ => PathBuf::from(DEFAULT_FILE),
        };
        Ok(Self {
            path,
            checkpoint_interval: checkpoint_interval_from(env::var(INTERVAL_ENV).ok().as_deref())?,
            allow_multiple_in_progress: false,
        })
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_multiple_in_progress(mut self, allow: bool) -> Self {
        self.allow_multiple_in_progress = allow;
        self
    }
}

/// Parse a raw interval override; `None` means unset.
pub fn checkpoint_interval_from(raw: Option<&str>) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_CHECKPOINT_INTERVAL);
    };
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(interval) if interval > 0 => Ok(interval as usize),
        _ => Err(ConfigError::InvalidInterval {
            raw: trimmed.to_string(),
        }),
    }
}

/// Default comment author: `PLANLOG_AUTHOR`, then `USER`/`LOGNAME`,
/// else `"unknown"`.
pub fn default_author() -> String {
    for key in [AUTHOR_ENV, "USER", "LOGNAME"] {
        if let Ok(value) = env::var(key) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    String::from("unknown")
}

use thiserror::Error;

use crate::db::sync::DriftSeverity;
use crate::season::transition::TransitionError;

/// Errors raised by the calendar/database synchronization layer.
///
/// These are structural failures: callers are expected to surface them and
/// offer a recovery choice (retry, reload from database, abort). Semantic
/// failures (e.g. "cannot simulate to a past date") are reported through
/// result structs with `success = false` instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("initialization failed at {sync_point}: {reason}")]
    Initialization { sync_point: &'static str, reason: String },

    #[error(
        "calendar drift of {drift_days} day(s) detected ({severity}): \
         calendar={calendar_date}, database={db_date}"
    )]
    Drift {
        drift_days: i64,
        severity: DriftSeverity,
        calendar_date: String,
        db_date: String,
    },

    #[error("persistence failed during {operation}: {reason}")]
    Persistence { operation: &'static str, reason: String },

    #[error("phase mismatch: calendar reports '{calendar_phase}', database has '{db_phase}'")]
    PhaseMismatch {
        calendar_phase: String,
        db_phase: String,
    },

    /// Invalid event data or violated domain precondition.
    #[error("invalid calendar state: {0}")]
    State(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("external service failure: {0}")]
    Service(String),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Service(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

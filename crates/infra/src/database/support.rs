//! Row conversion helpers shared by the SQLite repositories.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use slotflow_domain::SlotflowError;
use tokio::task;

/// Map JoinError from spawn_blocking to SlotflowError.
pub(crate) fn map_join_error(err: task::JoinError) -> SlotflowError {
    if err.is_cancelled() {
        SlotflowError::Internal("blocking task cancelled".into())
    } else {
        SlotflowError::Internal(format!("blocking task failed: {err}"))
    }
}

/// `?, ?, ?` with `count` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Parse a text column holding a persisted enum.
pub(crate) fn parse_column<T>(value: &str, column: &str) -> Result<T, SlotflowError>
where
    T: FromStr<Err = String>,
{
    value.parse::<T>().map_err(|e| SlotflowError::Database(format!("column {column}: {e}")))
}

/// Unix seconds column to UTC timestamp.
pub(crate) fn from_timestamp(secs: i64, column: &str) -> Result<DateTime<Utc>, SlotflowError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| SlotflowError::Database(format!("column {column}: timestamp out of range")))
}

/// Smallest whole second not before `instant`. Columns hold whole seconds,
/// so `col >= lower_bound_secs(t)` selects exactly the rows with `col >= t`.
pub(crate) fn lower_bound_secs(instant: DateTime<Utc>) -> i64 {
    let secs = instant.timestamp();
    if instant.timestamp_subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

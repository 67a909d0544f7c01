//! Stall detection: elapsed time since the last segment update is the only
//! liveness signal the generation service gives us.

use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;

use crate::rollup::ProjectStatus;
use crate::types::Timestamp;

/// Reference stall threshold: two minutes without a segment update.
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(120);

/// Liveness classification of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StallState {
    /// Still progressing (or nothing has been heard yet).
    Active,
    /// Not finished and not progressing; the UI offers "continue".
    Stalled,
    /// The project is complete, liveness does not matter.
    NotApplicable,
}

/// Classify a project's liveness at `now`.
///
/// - `NotApplicable` when complete.
/// - `Stalled` when the newest update is older than `threshold`, or when
///   failures have settled with nothing processing.
/// - `Active` otherwise, including a project with no segments.
pub fn classify_stall(status: &ProjectStatus, now: Timestamp, threshold: Duration) -> StallState {
    if status.is_complete {
        return StallState::NotApplicable;
    }

    let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
    let timed_out = status
        .last_update
        .is_some_and(|last| now.signed_duration_since(last) > threshold);

    if timed_out || (status.has_failed && status.processing == 0) {
        StallState::Stalled
    } else {
        StallState::Active
    }
}

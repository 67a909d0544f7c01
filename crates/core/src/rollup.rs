//! Rollup of segment-level statuses into one project-level status.
//!
//! [`aggregate`] is pure and O(N). It is called fresh on every read and its
//! result is never cached across writes: a single segment transition can
//! flip `is_complete` or `has_failed`.

use serde::Serialize;

use crate::segment::{Segment, SegmentStatus};
use crate::types::Timestamp;

/// Derived per-project status. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    pub pending: usize,
    /// Every segment completed, and there is at least one.
    pub is_complete: bool,
    /// Some segments failed and nothing is still running.
    pub has_failed: bool,
    /// Work is running, or queued work is resuming after earlier completions.
    pub is_active: bool,
    /// Most recent `updated_at` across the set; `None` when empty.
    pub last_update: Option<Timestamp>,
}

impl ProjectStatus {
    /// Every segment of a non-empty set failed.
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }

    /// Nothing pending or processing.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }

    /// Share of completed segments, 0-100 (0 for an empty set).
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// Summarize a segment set into a [`ProjectStatus`].
pub fn aggregate(segments: &[Segment]) -> ProjectStatus {
    let mut status = ProjectStatus {
        total: segments.len(),
        ..Default::default()
    };

    for segment in segments {
        match segment.status {
            SegmentStatus::Completed => status.completed += 1,
            SegmentStatus::Failed => status.failed += 1,
            SegmentStatus::Processing => status.processing += 1,
            SegmentStatus::Pending => status.pending += 1,
        }
        status.last_update = Some(match status.last_update {
            Some(latest) if latest >= segment.updated_at => latest,
            _ => segment.updated_at,
        });
    }

    status.is_complete = status.total > 0 && status.completed == status.total;
    status.has_failed =
        status.failed > 0 && status.processing == 0 && status.pending == 0 && !status.is_complete;
    status.is_active = status.processing > 0 || (status.pending > 0 && status.completed > 0);
    status
}

//! Segment row model and its conversion into the domain type.

use montage_core::error::CoreError;
use montage_core::segment::{Segment, SegmentKind, SegmentStatus, StatusId};
use montage_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `segments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SegmentRow {
    pub id: DbId,
    pub project_id: DbId,
    pub kind_id: StatusId,
    pub sequence_index: i32,
    pub status_id: StatusId,
    pub artifact_url: Option<String>,
    pub error_message: Option<String>,
    pub label: Option<String>,
    pub duration_secs: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<SegmentRow> for Segment {
    type Error = CoreError;

    fn try_from(row: SegmentRow) -> Result<Self, Self::Error> {
        Ok(Segment {
            id: row.id,
            project_id: row.project_id,
            kind: SegmentKind::try_from(row.kind_id)?,
            sequence_index: row.sequence_index,
            status: SegmentStatus::try_from(row.status_id)?,
            artifact_url: row.artifact_url,
            error: row.error_message,
            label: row.label,
            duration_secs: row.duration_secs,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

//! Repository for the `segments` table. Read-only: segment status is owned
//! by the generation workers.

use montage_core::types::DbId;
use sqlx::PgPool;

use crate::models::segment::SegmentRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, kind_id, sequence_index, status_id, \
    artifact_url, error_message, label, duration_secs, created_at, updated_at";

pub struct SegmentRepo;

impl SegmentRepo {
    /// List all segments of a project in playback order.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<SegmentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM segments
             WHERE project_id = $1
             ORDER BY sequence_index ASC, id ASC"
        );
        sqlx::query_as::<_, SegmentRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}

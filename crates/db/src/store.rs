//! PostgreSQL implementation of the engine's storage seams.

use async_trait::async_trait;
use montage_core::error::CoreError;
use montage_core::segment::Segment;
use montage_core::store::{CompletionStore, ProjectRecord, RecordOutcome, SegmentSource};
use montage_core::types::DbId;

use crate::repositories::{ProjectRepo, SegmentRepo};
use crate::DbPool;

/// [`SegmentSource`] and [`CompletionStore`] backed by a connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn store_error(err: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("Database error: {err}"))
}

#[async_trait]
impl SegmentSource for PgStore {
    async fn segments_for_project(&self, project_id: DbId) -> Result<Vec<Segment>, CoreError> {
        SegmentRepo::list_by_project(&self.pool, project_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(Segment::try_from)
            .collect()
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<ProjectRecord>, CoreError> {
        Ok(ProjectRepo::find_by_id(&self.pool, project_id)
            .await
            .map_err(store_error)?
            .map(ProjectRecord::from))
    }

    async fn projects_for_owner(&self, owner_id: DbId) -> Result<Vec<ProjectRecord>, CoreError> {
        Ok(ProjectRepo::list_by_owner(&self.pool, owner_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(ProjectRecord::from)
            .collect())
    }
}

#[async_trait]
impl CompletionStore for PgStore {
    async fn record_final_artifact(
        &self,
        project_id: DbId,
        final_url: &str,
    ) -> Result<RecordOutcome, CoreError> {
        let changed = ProjectRepo::set_final_artifact(&self.pool, project_id, final_url)
            .await
            .map_err(store_error)?;
        if changed > 0 {
            return Ok(RecordOutcome::Recorded);
        }

        // Zero rows: either the value is already stored or the row is gone.
        if ProjectRepo::exists(&self.pool, project_id)
            .await
            .map_err(store_error)?
        {
            tracing::debug!(project_id, "Final artifact already recorded");
            Ok(RecordOutcome::AlreadyRecorded)
        } else {
            Err(CoreError::NotFound {
                entity: "project",
                id: project_id,
            })
        }
    }
}

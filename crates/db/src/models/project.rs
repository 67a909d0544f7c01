//! Project row model.

use montage_core::store::ProjectRecord;
use montage_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub final_artifact_url: Option<String>,
    pub finalized_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Project> for ProjectRecord {
    fn from(row: Project) -> Self {
        ProjectRecord {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            final_artifact_url: row.final_artifact_url,
            finalized_at: row.finalized_at,
            created_at: row.created_at,
        }
    }
}

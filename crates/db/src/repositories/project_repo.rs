//! Repository for the `projects` table.

use montage_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::Project;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, owner_id, name, final_artifact_url, finalized_at, created_at, updated_at";

pub struct ProjectRepo;

impl ProjectRepo {
    /// Find a project by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's projects, newest first.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Conditionally set the final artifact URL.
    ///
    /// Writes only when the stored value differs, so repeating the call
    /// with the same URL touches no rows. Returns the number of rows changed.
    pub async fn set_final_artifact(
        pool: &PgPool,
        id: DbId,
        final_url: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projects
             SET final_artifact_url = $2, finalized_at = NOW()
             WHERE id = $1 AND final_artifact_url IS DISTINCT FROM $2",
        )
        .bind(id)
        .bind(final_url)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Whether a project row exists.
    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

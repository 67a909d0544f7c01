//! Collaborator seams: segment storage, the project's final-artifact field,
//! and the external combination service.
//!
//! The engine depends only on these traits. `montage-db` and
//! `montage-combine` provide the production implementations.

use async_trait::async_trait;
use serde::Serialize;

use crate::combine::CombineRequest;
use crate::combine_job::StatusReport;
use crate::error::CoreError;
use crate::segment::Segment;
use crate::types::{DbId, Timestamp};

/// The project row, without its segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub final_artifact_url: Option<String>,
    pub finalized_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Result of a conditional final-artifact write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// The row changed.
    Recorded,
    /// The same URL was already stored; nothing was written.
    AlreadyRecorded,
}

/// Read side of the persistent project store.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// All segments of a project ordered by `sequence_index`, then `id`.
    async fn segments_for_project(&self, project_id: DbId) -> Result<Vec<Segment>, CoreError>;

    /// A single project, or `None` if it does not exist.
    async fn find_project(&self, project_id: DbId) -> Result<Option<ProjectRecord>, CoreError>;

    /// Every project of an owner, newest first.
    async fn projects_for_owner(&self, owner_id: DbId) -> Result<Vec<ProjectRecord>, CoreError>;
}

/// Write side: the project's final-artifact field.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    /// Store `final_url` unless that exact value is already stored.
    ///
    /// Returns `CoreError::NotFound` when the project does not exist.
    async fn record_final_artifact(
        &self,
        project_id: DbId,
        final_url: &str,
    ) -> Result<RecordOutcome, CoreError>;
}

/// Failure talking to the external combination service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CombineServiceError {
    /// The service answered with an error status.
    #[error("Combination service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never got an answer (connect, DNS, timeout).
    #[error("Combination service unreachable: {0}")]
    Transport(String),

    /// The service answered 2xx with a body we cannot use.
    #[error("Unexpected combination service response: {0}")]
    Protocol(String),
}

/// The external combination service.
#[async_trait]
pub trait CombineService: Send + Sync {
    /// Submit a combine request and return the service's job id.
    async fn submit(&self, request: &CombineRequest) -> Result<String, CombineServiceError>;

    /// Query the status of a previously submitted job.
    async fn status(&self, job_id: &str) -> Result<StatusReport, CombineServiceError>;
}

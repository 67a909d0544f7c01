use montage_core::combine::CombineValidationError;
use montage_core::error::CoreError;
use montage_core::store::CombineServiceError;
use montage_core::types::DbId;

/// Errors surfaced by the engine to its callers.
///
/// Transient poll failures never appear here; the poller absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The combine request was invalid; nothing was sent upstream.
    #[error(transparent)]
    Validation(#[from] CombineValidationError),

    /// The combination service refused or failed the submit call.
    #[error("Combine submit failed: {0}")]
    Upstream(#[from] CombineServiceError),

    /// A combine job for the project is still in flight.
    #[error("Combine job {job_id} is already running for project {project_id}")]
    AlreadyRunning { project_id: DbId, job_id: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The persistent store failed.
    #[error("Store error: {0}")]
    Store(CoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Store(other),
        }
    }
}

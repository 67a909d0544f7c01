//! Persistence writer: records a finished combine's artifact on the project.
//!
//! The write is a conditional update keyed on the project, so the completion
//! handler and any later re-check may both call [`PersistenceWriter::record_completion`]
//! without coordinating. A repeat with the same URL reports
//! [`RecordOutcome::AlreadyRecorded`] and publishes nothing.

use std::sync::Arc;

use montage_core::event_types::EVENT_PROJECT_FINALIZED;
use montage_core::store::{CompletionStore, RecordOutcome};
use montage_core::types::DbId;
use montage_events::{EngineEvent, EventBus};

use crate::error::EngineError;

#[derive(Clone)]
pub struct PersistenceWriter {
    store: Arc<dyn CompletionStore>,
    bus: Arc<EventBus>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn CompletionStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub async fn record_completion(
        &self,
        project_id: DbId,
        final_url: &str,
    ) -> Result<RecordOutcome, EngineError> {
        let outcome = self
            .store
            .record_final_artifact(project_id, final_url)
            .await?;

        match outcome {
            RecordOutcome::Recorded => {
                tracing::info!(project_id, final_url, "Final artifact recorded");
                self.bus.publish(
                    EngineEvent::new(EVENT_PROJECT_FINALIZED, project_id)
                        .with_payload(serde_json::json!({ "final_artifact_url": final_url })),
                );
            }
            RecordOutcome::AlreadyRecorded => {
                tracing::debug!(project_id, "Final artifact already recorded, skipping");
            }
        }
        Ok(outcome)
    }
}

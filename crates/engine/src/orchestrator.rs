//! Combine orchestrator: validates and submits combine requests, then owns
//! one polling task per project.
//!
//! A project has at most one live combine job. A submit while one is
//! running is rejected with [`EngineError::AlreadyRunning`]; callers cancel
//! first. The terminal snapshot of the last job stays readable until the
//! next submit for the project.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use montage_core::combine::{
    build_combine_request, CombineOptions, CombineRequest, CombineValidationError,
};
use montage_core::combine_job::{CombineJob, CombineState};
use montage_core::event_types::{
    EVENT_COMBINE_CANCELLED, EVENT_COMBINE_COMPLETED, EVENT_COMBINE_FAILED,
    EVENT_COMBINE_SUBMITTED, EVENT_COMBINE_TIMED_OUT,
};
use montage_core::error::CoreError;
use montage_core::segment::{Segment, SegmentKind};
use montage_core::stage::select_stage;
use montage_core::store::{CombineService, CombineServiceError, CompletionStore, SegmentSource};
use montage_core::types::DbId;
use montage_events::{EngineEvent, EventBus};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::poller::CombinePoller;
use crate::writer::PersistenceWriter;

/// How long `cancel` and `shutdown` wait for a polling task to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-project bookkeeping.
enum Slot {
    /// Submit call in progress; no job id yet.
    Submitting,
    Tracked(TrackedJob),
}

struct TrackedJob {
    job: watch::Receiver<CombineJob>,
    /// Child of the orchestrator's master token.
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrackedJob {
    fn is_running(&self) -> bool {
        !self.job.borrow().is_terminal()
    }
}

pub struct CombineOrchestrator {
    source: Arc<dyn SegmentSource>,
    launcher: Launcher,
    jobs: Arc<RwLock<HashMap<DbId, Slot>>>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
}

/// What a submit needs once the slot is reserved. Owned, so the upstream
/// call and the slot hand-off can run on their own task.
#[derive(Clone)]
struct Launcher {
    service: Arc<dyn CombineService>,
    poller: Arc<CombinePoller>,
    writer: PersistenceWriter,
    bus: Arc<EventBus>,
    submit_timeout: Duration,
}

impl CombineOrchestrator {
    pub fn new(
        source: Arc<dyn SegmentSource>,
        completions: Arc<dyn CompletionStore>,
        service: Arc<dyn CombineService>,
        bus: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        let poller = Arc::new(CombinePoller::new(Arc::clone(&service), Arc::clone(&bus), config));
        Self {
            source,
            launcher: Launcher {
                service,
                poller,
                writer: PersistenceWriter::new(completions, Arc::clone(&bus)),
                bus,
                submit_timeout: config.submit_timeout,
            },
            jobs: Arc::new(RwLock::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit `segments` (in playback order) for combination and start polling.
    ///
    /// Validation happens before anything is sent upstream. An upstream
    /// failure or timeout leaves the project exactly as it was, so the
    /// caller may retry with the same input. The slot is settled even if
    /// this future is dropped mid-call.
    pub async fn submit(
        &self,
        project_id: DbId,
        segments: &[Segment],
        options: CombineOptions,
    ) -> Result<String, EngineError> {
        let request = build_combine_request(project_id, segments, options)?;
        let previous = self.reserve(project_id).await?;

        let handoff = tokio::spawn(launch(
            self.launcher.clone(),
            Arc::clone(&self.jobs),
            self.cancel.child_token(),
            request,
            previous,
        ));

        match handoff.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(project_id, error = %e, "Combine submit task failed");
                let mut jobs = self.jobs.write().await;
                if matches!(jobs.get(&project_id), Some(Slot::Submitting)) {
                    jobs.remove(&project_id);
                }
                Err(EngineError::Store(CoreError::Internal(format!(
                    "Combine submit task failed: {e}"
                ))))
            }
        }
    }

    /// Load the project's segments, pick the video stage and submit it.
    pub async fn submit_for_project(
        &self,
        project_id: DbId,
        options: CombineOptions,
    ) -> Result<String, EngineError> {
        if self.source.find_project(project_id).await?.is_none() {
            return Err(EngineError::NotFound {
                entity: "project",
                id: project_id,
            });
        }

        let segments = self.source.segments_for_project(project_id).await?;
        let group = select_stage(&segments);
        if group.kind != SegmentKind::Video {
            return Err(CombineValidationError::Empty { project_id }.into());
        }
        self.submit(project_id, &group.segments, options).await
    }

    /// Latest snapshot of the project's current or last combine job.
    pub async fn job(&self, project_id: DbId) -> Option<CombineJob> {
        match self.jobs.read().await.get(&project_id) {
            Some(Slot::Tracked(tracked)) => Some(tracked.job.borrow().clone()),
            _ => None,
        }
    }

    /// Follow the project's combine job as it changes.
    pub async fn subscribe(&self, project_id: DbId) -> Option<watch::Receiver<CombineJob>> {
        match self.jobs.read().await.get(&project_id) {
            Some(Slot::Tracked(tracked)) => Some(tracked.job.clone()),
            _ => None,
        }
    }

    /// Whether a combine job for the project is being submitted or polled.
    pub async fn is_in_flight(&self, project_id: DbId) -> bool {
        match self.jobs.read().await.get(&project_id) {
            Some(Slot::Submitting) => true,
            Some(Slot::Tracked(tracked)) => tracked.is_running(),
            None => false,
        }
    }

    /// Stop polling the project's job and return its final snapshot.
    ///
    /// The server-side job is left alone. Cancelling a job that already
    /// finished returns its terminal snapshot unchanged.
    pub async fn cancel(&self, project_id: DbId) -> Result<CombineJob, EngineError> {
        let mut rx = {
            let jobs = self.jobs.read().await;
            match jobs.get(&project_id) {
                Some(Slot::Tracked(tracked)) => {
                    tracked.cancel.cancel();
                    tracked.job.clone()
                }
                _ => {
                    return Err(EngineError::NotFound {
                        entity: "combine job",
                        id: project_id,
                    })
                }
            }
        };

        if tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|job| job.is_terminal()))
            .await
            .is_err()
        {
            tracing::warn!(project_id, "Combine task did not settle after cancel");
        }
        let job = rx.borrow().clone();
        Ok(job)
    }

    /// Cancel every polling task and wait up to 5 seconds for each to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down combine orchestrator");
        self.cancel.cancel();

        let mut jobs = self.jobs.write().await;
        for (project_id, slot) in jobs.drain() {
            if let Slot::Tracked(tracked) = slot {
                tracing::debug!(project_id, "Stopping combine task");
                let _ = tokio::time::timeout(SETTLE_TIMEOUT, tracked.task).await;
            }
        }
        tracing::info!("Combine orchestrator shut down complete");
    }

    // ---- private helpers ----

    /// Claim the project's slot for a new submit. Returns the previous
    /// (terminal) job so a failed submit can put it back.
    async fn reserve(&self, project_id: DbId) -> Result<Option<TrackedJob>, EngineError> {
        let mut jobs = self.jobs.write().await;
        match jobs.remove(&project_id) {
            Some(Slot::Submitting) => {
                jobs.insert(project_id, Slot::Submitting);
                Err(EngineError::AlreadyRunning {
                    project_id,
                    job_id: "pending".into(),
                })
            }
            Some(Slot::Tracked(tracked)) if tracked.is_running() => {
                let job_id = tracked.job.borrow().job_id.clone();
                jobs.insert(project_id, Slot::Tracked(tracked));
                Err(EngineError::AlreadyRunning { project_id, job_id })
            }
            Some(Slot::Tracked(tracked)) => {
                jobs.insert(project_id, Slot::Submitting);
                Ok(Some(tracked))
            }
            None => {
                jobs.insert(project_id, Slot::Submitting);
                Ok(None)
            }
        }
    }
}

/// Call upstream, then either track the new job or put the previous slot
/// back.
async fn launch(
    launcher: Launcher,
    jobs: Arc<RwLock<HashMap<DbId, Slot>>>,
    cancel: CancellationToken,
    request: CombineRequest,
    previous: Option<TrackedJob>,
) -> Result<String, EngineError> {
    let project_id = request.project_id;

    let submitted = match tokio::time::timeout(
        launcher.submit_timeout,
        launcher.service.submit(&request),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(CombineServiceError::Transport(format!(
            "submit timed out after {}s",
            launcher.submit_timeout.as_secs()
        ))),
    };

    let job_id = match submitted {
        Ok(job_id) => job_id,
        Err(e) => {
            tracing::warn!(project_id, error = %e, "Combine submit rejected");
            let mut jobs = jobs.write().await;
            match previous {
                Some(tracked) => jobs.insert(project_id, Slot::Tracked(tracked)),
                None => jobs.remove(&project_id),
            };
            return Err(EngineError::Upstream(e));
        }
    };

    let job = CombineJob::new(job_id.clone(), project_id, Utc::now());
    let (tx, rx) = watch::channel(job.clone());
    let task = tokio::spawn(drive_job(
        launcher.poller,
        launcher.writer,
        Arc::clone(&launcher.bus),
        job,
        tx,
        cancel.clone(),
    ));

    jobs.write().await.insert(
        project_id,
        Slot::Tracked(TrackedJob {
            job: rx,
            cancel,
            task,
        }),
    );

    tracing::info!(
        project_id,
        job_id = %job_id,
        clips = request.clips.len(),
        "Combine job started",
    );
    launcher.bus.publish(
        EngineEvent::new(EVENT_COMBINE_SUBMITTED, project_id)
            .with_job(job_id.clone())
            .with_payload(serde_json::json!({ "clips": request.clips.len() })),
    );
    Ok(job_id)
}

fn terminal_event(state: CombineState) -> Option<&'static str> {
    match state {
        CombineState::Completed => Some(EVENT_COMBINE_COMPLETED),
        CombineState::Failed => Some(EVENT_COMBINE_FAILED),
        CombineState::TimedOut => Some(EVENT_COMBINE_TIMED_OUT),
        CombineState::Cancelled => Some(EVENT_COMBINE_CANCELLED),
        CombineState::Submitted | CombineState::Polling => None,
    }
}

/// Poll until terminal, hand a completed artifact to the writer, then
/// publish the terminal snapshot.
async fn drive_job(
    poller: Arc<CombinePoller>,
    writer: PersistenceWriter,
    bus: Arc<EventBus>,
    job: CombineJob,
    tx: watch::Sender<CombineJob>,
    cancel: CancellationToken,
) {
    let mut job = poller.run(job, &tx, &cancel).await;

    if job.state == CombineState::Completed {
        if let Some(url) = job.final_artifact_url.clone() {
            if let Err(e) = writer.record_completion(job.project_id, &url).await {
                tracing::error!(
                    project_id = job.project_id,
                    job_id = %job.job_id,
                    error = %e,
                    "Failed to record final artifact",
                );
                job.error = Some(format!("Final artifact could not be saved: {e}"));
            }
        }
    }

    match job.state {
        CombineState::Completed => tracing::info!(
            project_id = job.project_id,
            job_id = %job.job_id,
            attempts = job.attempts,
            "Combine job completed",
        ),
        CombineState::Cancelled => tracing::info!(
            project_id = job.project_id,
            job_id = %job.job_id,
            "Combine polling cancelled",
        ),
        _ => tracing::warn!(
            project_id = job.project_id,
            job_id = %job.job_id,
            state = ?job.state,
            error = job.error.as_deref().unwrap_or_default(),
            "Combine job did not complete",
        ),
    }

    if let Some(event_type) = terminal_event(job.state) {
        bus.publish(
            EngineEvent::new(event_type, job.project_id)
                .with_job(job.job_id.clone())
                .with_payload(serde_json::json!({
                    "final_artifact_url": job.final_artifact_url,
                    "error": job.error,
                    "attempts": job.attempts,
                })),
        );
    }
    tx.send_replace(job);
}

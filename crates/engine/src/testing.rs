//! In-memory collaborators for tests: a segment/project store and a
//! combination service that replays a script of status responses.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use montage_core::combine::CombineRequest;
use montage_core::combine_job::{ReportedStatus, StatusReport};
use montage_core::error::CoreError;
use montage_core::segment::{Segment, SegmentKind, SegmentStatus};
use montage_core::store::{
    CombineService, CombineServiceError, CompletionStore, ProjectRecord, RecordOutcome,
    SegmentSource,
};
use montage_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Fixed creation time for fixture projects.
pub fn fixture_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A segment satisfying the status/artifact/error invariants.
pub fn segment(
    id: DbId,
    project_id: DbId,
    kind: SegmentKind,
    status: SegmentStatus,
    updated_at: Timestamp,
) -> Segment {
    Segment {
        id,
        project_id,
        kind,
        sequence_index: id as i32,
        status,
        artifact_url: (status == SegmentStatus::Completed)
            .then(|| format!("https://cdn.test/{project_id}/{id}.mp4")),
        error: (status == SegmentStatus::Failed).then(|| "generation failed".to_string()),
        label: None,
        duration_secs: None,
        created_at: updated_at - Duration::seconds(30),
        updated_at,
    }
}

pub fn in_progress(progress: Option<f64>) -> StatusReport {
    StatusReport {
        progress_percentage: progress,
        ..StatusReport::in_progress()
    }
}

pub fn completed(url: &str) -> StatusReport {
    StatusReport {
        status: ReportedStatus::Completed,
        progress_percentage: Some(100.0),
        final_url: Some(url.to_string()),
        ..StatusReport::in_progress()
    }
}

pub fn failed(message: &str) -> StatusReport {
    StatusReport {
        status: ReportedStatus::Failed,
        error_message: Some(message.to_string()),
        ..StatusReport::in_progress()
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    projects: Mutex<BTreeMap<DbId, ProjectRecord>>,
    segments: Mutex<Vec<Segment>>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: DbId, owner_id: DbId) {
        let record = ProjectRecord {
            id,
            owner_id,
            name: format!("Project {id}"),
            final_artifact_url: None,
            finalized_at: None,
            created_at: fixture_epoch() + Duration::seconds(id),
        };
        lock(&self.projects).insert(id, record);
    }

    /// Insert or replace a segment (matched by id).
    pub fn upsert_segment(&self, segment: Segment) {
        let mut segments = lock(&self.segments);
        match segments.iter_mut().find(|s| s.id == segment.id) {
            Some(existing) => *existing = segment,
            None => segments.push(segment),
        }
    }

    pub fn final_artifact(&self, project_id: DbId) -> Option<String> {
        lock(&self.projects)
            .get(&project_id)
            .and_then(|p| p.final_artifact_url.clone())
    }

    /// Number of writes that actually changed a row.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentSource for InMemoryStore {
    async fn segments_for_project(&self, project_id: DbId) -> Result<Vec<Segment>, CoreError> {
        let mut segments: Vec<Segment> = lock(&self.segments)
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| (s.sequence_index, s.id));
        Ok(segments)
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<ProjectRecord>, CoreError> {
        Ok(lock(&self.projects).get(&project_id).cloned())
    }

    async fn projects_for_owner(&self, owner_id: DbId) -> Result<Vec<ProjectRecord>, CoreError> {
        let mut projects: Vec<ProjectRecord> = lock(&self.projects)
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }
}

#[async_trait]
impl CompletionStore for InMemoryStore {
    async fn record_final_artifact(
        &self,
        project_id: DbId,
        final_url: &str,
    ) -> Result<RecordOutcome, CoreError> {
        let mut projects = lock(&self.projects);
        let project = projects.get_mut(&project_id).ok_or(CoreError::NotFound {
            entity: "project",
            id: project_id,
        })?;
        if project.final_artifact_url.as_deref() == Some(final_url) {
            return Ok(RecordOutcome::AlreadyRecorded);
        }
        project.final_artifact_url = Some(final_url.to_string());
        project.finalized_at = Some(Utc::now());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(RecordOutcome::Recorded)
    }
}

// ---------------------------------------------------------------------------
// ScriptedCombineService
// ---------------------------------------------------------------------------

/// One scripted answer to a status query.
pub enum ScriptStep {
    Report(StatusReport),
    Error(CombineServiceError),
    /// Never answer; the caller's timeout must fire.
    Hang,
}

/// One scripted answer to a submit call.
enum SubmitStep {
    Reply(Result<String, CombineServiceError>),
    Hang,
}

/// Combination service that answers status queries from a script and
/// reports "in progress" once the script runs out.
#[derive(Default)]
pub struct ScriptedCombineService {
    submit_results: Mutex<VecDeque<SubmitStep>>,
    script: Mutex<VecDeque<ScriptStep>>,
    submitted: Mutex<Vec<CombineRequest>>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedCombineService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let service = Self::new();
        lock(&service.script).extend(steps);
        service
    }

    /// Queue the outcome of the next submit call.
    pub fn push_submit(&self, result: Result<String, CombineServiceError>) {
        lock(&self.submit_results).push_back(SubmitStep::Reply(result));
    }

    /// The next submit call never answers.
    pub fn push_submit_hang(&self) {
        lock(&self.submit_results).push_back(SubmitStep::Hang);
    }

    pub fn push_step(&self, step: ScriptStep) {
        lock(&self.script).push_back(step);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<CombineRequest> {
        lock(&self.submitted).clone()
    }
}

#[async_trait]
impl CombineService for ScriptedCombineService {
    async fn submit(&self, request: &CombineRequest) -> Result<String, CombineServiceError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.submitted).push(request.clone());
        let step = lock(&self.submit_results).pop_front();
        match step {
            Some(SubmitStep::Reply(result)) => result,
            Some(SubmitStep::Hang) => std::future::pending().await,
            None => Ok(format!("job_{n}")),
        }
    }

    async fn status(&self, _job_id: &str) -> Result<StatusReport, CombineServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = lock(&self.script).pop_front();
        match step {
            Some(ScriptStep::Report(report)) => Ok(report),
            Some(ScriptStep::Error(err)) => Err(err),
            Some(ScriptStep::Hang) => std::future::pending().await,
            None => Ok(StatusReport::in_progress()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

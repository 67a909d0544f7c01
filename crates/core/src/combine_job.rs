//! Combine job state machine.
//!
//! `Submitted -> Polling -> {Completed | Failed | TimedOut | Cancelled}`.
//!
//! [`CombineJob`] is created when the combination service accepts a request
//! and is mutated only by the poller, one status report (or one failed
//! query) at a time. All transitions are pure so the loop can be tested by
//! feeding reports directly.

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Reference attempt ceiling: 120 polls at 5 seconds is about ten minutes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Estimated progress at attempt zero when the service reports none.
pub const ESTIMATE_BASE_PERCENT: f64 = 15.0;
/// Estimated progress gained per attempt.
pub const ESTIMATE_STEP_PERCENT: f64 = 1.5;
/// Estimates never exceed this; only a real completion reaches 100.
pub const ESTIMATE_CEILING_PERCENT: f64 = 90.0;

/// Surfaced when the attempt ceiling is reached with no terminal report.
pub const TIMEOUT_MESSAGE: &str = "Video processing timeout - please try again";
/// Surfaced when the service fails a job without saying why.
pub const GENERIC_FAILURE_MESSAGE: &str = "Video processing failed";
/// Surfaced when the service claims completion but returns no artifact.
pub const MISSING_ARTIFACT_MESSAGE: &str = "Combine reported completion without a final artifact URL";

const STEP_SUBMITTED: &str = "Submitted";
const STEP_COMPLETED: &str = "Completed";

/// Fallback phase labels keyed by the first attempt they apply to.
const PHASE_LABELS: &[(u32, &str)] = &[
    (0, "Downloading video segments"),
    (10, "Concatenating video segments"),
    (30, "Encoding final video"),
    (60, "Finalizing"),
];

/// Lifecycle state of one combination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineState {
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
    /// The local loop was cancelled; the server-side job may still finish.
    Cancelled,
}

impl CombineState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Submitted | Self::Polling)
    }
}

/// Job status as the combination service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStatus {
    InProgress,
    Completed,
    Failed,
}

/// One status response, already decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: ReportedStatus,
    pub progress_percentage: Option<f64>,
    pub current_step: Option<String>,
    pub final_url: Option<String>,
    pub error_message: Option<String>,
}

impl StatusReport {
    /// A non-terminal report with nothing but the status.
    pub fn in_progress() -> Self {
        Self {
            status: ReportedStatus::InProgress,
            progress_percentage: None,
            current_step: None,
            final_url: None,
            error_message: None,
        }
    }
}

/// Estimated progress after `attempts` polls without an explicit value.
pub fn estimate_progress(attempts: u32) -> f64 {
    (ESTIMATE_BASE_PERCENT + f64::from(attempts) * ESTIMATE_STEP_PERCENT)
        .min(ESTIMATE_CEILING_PERCENT)
}

/// Human-readable phase for `attempts` polls without a service-provided step.
pub fn phase_label(attempts: u32) -> &'static str {
    PHASE_LABELS
        .iter()
        .rev()
        .find(|(from, _)| attempts >= *from)
        .map(|(_, label)| *label)
        .unwrap_or(PHASE_LABELS[0].1)
}

/// One in-flight (or just finished) combination attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombineJob {
    pub job_id: String,
    pub project_id: DbId,
    pub state: CombineState,
    /// 0-100, never decreases.
    pub progress_percent: u8,
    pub current_step: String,
    /// Number of polls so far, failed queries included.
    pub attempts: u32,
    /// Set only when `state` is `Completed`.
    pub final_artifact_url: Option<String>,
    /// Failure, timeout, or persistence message for the UI.
    pub error: Option<String>,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CombineJob {
    pub fn new(job_id: impl Into<String>, project_id: DbId, now: Timestamp) -> Self {
        Self {
            job_id: job_id.into(),
            project_id,
            state: CombineState::Submitted,
            progress_percent: 0,
            current_step: STEP_SUBMITTED.to_string(),
            attempts: 0,
            final_artifact_url: None,
            error: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply one status report. Returns `true` once the job is terminal.
    pub fn apply_report(&mut self, report: StatusReport, max_attempts: u32, now: Timestamp) -> bool {
        if self.is_terminal() {
            return true;
        }
        self.attempts += 1;
        self.state = CombineState::Polling;
        self.updated_at = now;

        match report.status {
            ReportedStatus::Completed => {
                match report.final_url.filter(|url| !url.trim().is_empty()) {
                    Some(url) => {
                        self.state = CombineState::Completed;
                        self.progress_percent = 100;
                        self.final_artifact_url = Some(url);
                        self.current_step = non_empty(report.current_step)
                            .unwrap_or_else(|| STEP_COMPLETED.to_string());
                    }
                    None => self.fail(MISSING_ARTIFACT_MESSAGE.to_string()),
                }
                return true;
            }
            ReportedStatus::Failed => {
                self.fail(
                    report
                        .error_message
                        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                );
                return true;
            }
            ReportedStatus::InProgress => {}
        }

        let candidate = report
            .progress_percentage
            .filter(|p| p.is_finite())
            .unwrap_or_else(|| estimate_progress(self.attempts))
            .clamp(0.0, 100.0) as u8;
        self.progress_percent = self.progress_percent.max(candidate);
        self.current_step =
            non_empty(report.current_step).unwrap_or_else(|| phase_label(self.attempts).to_string());

        self.check_ceiling(max_attempts)
    }

    /// Record a status query that failed in transit. It only consumes an
    /// attempt. Returns `true` once the job is terminal.
    pub fn record_transient_failure(&mut self, max_attempts: u32, now: Timestamp) -> bool {
        if self.is_terminal() {
            return true;
        }
        self.attempts += 1;
        self.state = CombineState::Polling;
        self.updated_at = now;
        self.check_ceiling(max_attempts)
    }

    /// Stop tracking locally. No-op once terminal.
    pub fn cancel(&mut self, now: Timestamp) {
        if !self.is_terminal() {
            self.state = CombineState::Cancelled;
            self.updated_at = now;
        }
    }

    fn fail(&mut self, message: String) {
        self.state = CombineState::Failed;
        self.error = Some(message);
    }

    fn check_ceiling(&mut self, max_attempts: u32) -> bool {
        if self.attempts >= max_attempts {
            self.state = CombineState::TimedOut;
            self.error = Some(TIMEOUT_MESSAGE.to_string());
            true
        } else {
            false
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::fixtures::epoch;

    fn job() -> CombineJob {
        CombineJob::new("job_abc", 1, epoch())
    }

    fn report(progress: Option<f64>, step: Option<&str>) -> StatusReport {
        StatusReport {
            progress_percentage: progress,
            current_step: step.map(str::to_string),
            ..StatusReport::in_progress()
        }
    }

    #[test]
    fn estimate_grows_then_caps() {
        assert_eq!(estimate_progress(0), 15.0);
        assert_eq!(estimate_progress(10), 30.0);
        assert_eq!(estimate_progress(50), 90.0);
        assert_eq!(estimate_progress(500), 90.0);
    }

    #[test]
    fn phase_labels_follow_attempt_buckets() {
        assert_eq!(phase_label(0), "Downloading video segments");
        assert_eq!(phase_label(9), "Downloading video segments");
        assert_eq!(phase_label(10), "Concatenating video segments");
        assert_eq!(phase_label(45), "Encoding final video");
        assert_eq!(phase_label(119), "Finalizing");
    }

    #[test]
    fn new_job_is_submitted() {
        let job = job();
        assert_eq!(job.state, CombineState::Submitted);
        assert_eq!(job.attempts, 0);
        assert!(!job.is_terminal());
    }

    #[test]
    fn explicit_progress_and_step_win() {
        let mut job = job();
        let done = job.apply_report(report(Some(42.0), Some("Adding background music")), 120, epoch());
        assert!(!done);
        assert_eq!(job.state, CombineState::Polling);
        assert_eq!(job.progress_percent, 42);
        assert_eq!(job.current_step, "Adding background music");
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn missing_progress_falls_back_to_estimate() {
        let mut job = job();
        job.apply_report(StatusReport::in_progress(), 120, epoch());
        assert_eq!(job.progress_percent, 16);
        assert_eq!(job.current_step, "Downloading video segments");
    }

    #[test]
    fn progress_never_moves_backward() {
        let mut job = job();
        job.apply_report(report(Some(70.0), None), 120, epoch());
        job.apply_report(report(Some(30.0), None), 120, epoch());
        assert_eq!(job.progress_percent, 70);
        job.apply_report(StatusReport::in_progress(), 120, epoch());
        assert_eq!(job.progress_percent, 70);
    }

    #[test]
    fn completion_with_url_is_terminal_success() {
        let mut job = job();
        let done = job.apply_report(
            StatusReport {
                status: ReportedStatus::Completed,
                final_url: Some("https://cdn.test/final.mp4".into()),
                ..StatusReport::in_progress()
            },
            120,
            epoch(),
        );
        assert!(done);
        assert_eq!(job.state, CombineState::Completed);
        assert_eq!(job.progress_percent, 100);
        assert_eq!(job.final_artifact_url.as_deref(), Some("https://cdn.test/final.mp4"));
    }

    #[test]
    fn completion_without_url_fails() {
        let mut job = job();
        let done = job.apply_report(
            StatusReport {
                status: ReportedStatus::Completed,
                final_url: Some(" ".into()),
                ..StatusReport::in_progress()
            },
            120,
            epoch(),
        );
        assert!(done);
        assert_eq!(job.state, CombineState::Failed);
        assert_eq!(job.error.as_deref(), Some(MISSING_ARTIFACT_MESSAGE));
        assert!(job.final_artifact_url.is_none());
    }

    #[test]
    fn failure_message_is_kept_verbatim() {
        let mut job = job();
        job.apply_report(
            StatusReport {
                status: ReportedStatus::Failed,
                error_message: Some("ffmpeg exited with status 1".into()),
                ..StatusReport::in_progress()
            },
            120,
            epoch(),
        );
        assert_eq!(job.state, CombineState::Failed);
        assert_eq!(job.error.as_deref(), Some("ffmpeg exited with status 1"));
    }

    #[test]
    fn ceiling_times_out() {
        let mut job = job();
        for _ in 0..2 {
            assert!(!job.apply_report(StatusReport::in_progress(), 3, epoch()));
        }
        assert!(job.apply_report(StatusReport::in_progress(), 3, epoch()));
        assert_eq!(job.state, CombineState::TimedOut);
        assert_eq!(job.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(job.attempts, 3);
    }

    #[test]
    fn transient_failures_count_toward_ceiling_only() {
        let mut job = job();
        job.apply_report(report(Some(40.0), Some("Concatenating")), 3, epoch());
        assert!(!job.record_transient_failure(3, epoch()));
        assert_eq!(job.progress_percent, 40);
        assert_eq!(job.current_step, "Concatenating");
        assert!(job.record_transient_failure(3, epoch()));
        assert_eq!(job.state, CombineState::TimedOut);
    }

    #[test]
    fn terminal_job_ignores_further_reports() {
        let mut job = job();
        job.apply_report(
            StatusReport {
                status: ReportedStatus::Failed,
                ..StatusReport::in_progress()
            },
            120,
            epoch(),
        );
        assert!(job.apply_report(report(Some(99.0), None), 120, epoch()));
        assert_eq!(job.attempts, 1);
        assert_eq!(job.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
        job.cancel(epoch());
        assert_eq!(job.state, CombineState::Failed);
    }

    #[test]
    fn cancel_stops_a_polling_job() {
        let mut job = job();
        job.apply_report(StatusReport::in_progress(), 120, epoch());
        job.cancel(epoch());
        assert_eq!(job.state, CombineState::Cancelled);
        assert!(job.is_terminal());
    }
}

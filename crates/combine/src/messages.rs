//! Wire format of the combination service.
//!
//! Every response is wrapped in `{ "success": bool, "data": ... }`.

use montage_core::combine::CombineRequest;
use montage_core::combine_job::{ReportedStatus, StatusReport};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /api/combine-final-video`.
#[derive(Debug, Serialize)]
pub struct CombinePayload {
    pub project_id: String,
    pub segments: Vec<PayloadSegment>,
    pub options: PayloadOptions,
}

#[derive(Debug, Serialize)]
pub struct PayloadSegment {
    #[serde(rename = "type")]
    pub segment_type: String,
    pub video_url: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct PayloadOptions {
    pub bgm_url: Option<String>,
    pub bgm_volume: f32,
}

impl From<&CombineRequest> for CombinePayload {
    fn from(request: &CombineRequest) -> Self {
        Self {
            project_id: request.project_id.to_string(),
            segments: request
                .clips
                .iter()
                .map(|clip| PayloadSegment {
                    segment_type: clip.label.clone(),
                    video_url: clip.artifact_url.clone(),
                    duration_seconds: clip.duration_secs,
                })
                .collect(),
            options: PayloadOptions {
                bgm_url: request.options.background_audio_url.clone(),
                bgm_volume: request.options.background_audio_volume,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response envelope shared by all endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

/// `data` of a submit response.
#[derive(Debug, Deserialize)]
pub struct SubmitData {
    pub job_id: Option<String>,
    pub status: Option<String>,
    pub estimated_time_seconds: Option<u64>,
}

/// `data` of a job-status response.
#[derive(Debug, Deserialize)]
pub struct JobStatusData {
    pub status: String,
    pub progress_percentage: Option<f64>,
    pub current_step: Option<String>,
    pub final_video_url: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl JobStatusData {
    /// Map the service's status string. Anything that is not a known
    /// terminal value counts as still running.
    pub fn reported_status(&self) -> ReportedStatus {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "completed" => ReportedStatus::Completed,
            "failed" => ReportedStatus::Failed,
            _ => ReportedStatus::InProgress,
        }
    }
}

impl From<JobStatusData> for StatusReport {
    fn from(data: JobStatusData) -> Self {
        StatusReport {
            status: data.reported_status(),
            progress_percentage: data.progress_percentage,
            current_step: data.current_step,
            final_url: data.final_video_url,
            error_message: data.error_message,
        }
    }
}

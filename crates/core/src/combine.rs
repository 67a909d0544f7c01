//! Combine request construction and validation.
//!
//! A combine request stitches a project's completed segments, in playback
//! order, into one artifact. Validation happens here so an invalid request
//! is never sent upstream.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::segment::{Segment, DEFAULT_SEGMENT_DURATION_SECS, DEFAULT_SEGMENT_LABEL};
use crate::types::DbId;

/// Default mix level for background audio under the combined clips.
pub const DEFAULT_BACKGROUND_AUDIO_VOLUME: f32 = 0.15;

/// Caller-supplied options for a combine request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CombineOptions {
    #[validate(url)]
    pub background_audio_url: Option<String>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub background_audio_volume: f32,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            background_audio_url: None,
            background_audio_volume: DEFAULT_BACKGROUND_AUDIO_VOLUME,
        }
    }
}

/// One clip of the combine payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombineClip {
    pub segment_id: DbId,
    pub label: String,
    pub artifact_url: String,
    pub duration_secs: f64,
}

/// Ordered payload handed to the combination service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombineRequest {
    pub project_id: DbId,
    pub clips: Vec<CombineClip>,
    pub options: CombineOptions,
}

/// The request was rejected before reaching the combination service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CombineValidationError {
    #[error("No segments to combine for project {project_id}")]
    Empty { project_id: DbId },

    #[error("Segments not ready to combine: {}", format_ids(.segment_ids))]
    NotReady { segment_ids: Vec<DbId> },

    #[error("Segment {segment_id} belongs to project {actual}, not {expected}")]
    WrongProject {
        segment_id: DbId,
        expected: DbId,
        actual: DbId,
    },

    #[error("Invalid combine options: {0}")]
    Options(String),
}

fn format_ids(ids: &[DbId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the combine payload for `segments`, preserving their order.
///
/// Every segment must be `Completed` with a non-empty artifact URL; all
/// offenders are named in the error, not just the first.
pub fn build_combine_request(
    project_id: DbId,
    segments: &[Segment],
    options: CombineOptions,
) -> Result<CombineRequest, CombineValidationError> {
    if segments.is_empty() {
        return Err(CombineValidationError::Empty { project_id });
    }

    options
        .validate()
        .map_err(|e| CombineValidationError::Options(e.to_string()))?;

    if let Some(stray) = segments.iter().find(|s| s.project_id != project_id) {
        return Err(CombineValidationError::WrongProject {
            segment_id: stray.id,
            expected: project_id,
            actual: stray.project_id,
        });
    }

    let not_ready: Vec<DbId> = segments
        .iter()
        .filter(|s| s.usable_artifact().is_none())
        .map(|s| s.id)
        .collect();
    if !not_ready.is_empty() {
        return Err(CombineValidationError::NotReady {
            segment_ids: not_ready,
        });
    }

    let clips = segments
        .iter()
        .filter_map(|s| {
            s.usable_artifact().map(|url| CombineClip {
                segment_id: s.id,
                label: s
                    .label
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SEGMENT_LABEL.to_string()),
                artifact_url: url.to_string(),
                duration_secs: s.duration_secs.unwrap_or(DEFAULT_SEGMENT_DURATION_SECS),
            })
        })
        .collect();

    Ok(CombineRequest {
        project_id,
        clips,
        options,
    })
}

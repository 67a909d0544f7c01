//! UI-facing project summary: rollup + stall classification + stage
//! selection folded into one value, plus the dashboard and history listing
//! rules.
//!
//! Every call site (dashboard, history, combine screen) goes through
//! [`summarize`] so they cannot drift apart.

use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;

use crate::rollup::{aggregate, ProjectStatus};
use crate::segment::{Segment, SegmentKind};
use crate::stage::select_stage;
use crate::stall::{classify_stall, StallState};
use crate::types::{DbId, Timestamp};

/// Reference window in which settled projects still show on the dashboard.
pub const DEFAULT_ACTIVE_LISTING_WINDOW: Duration = Duration::from_secs(3600);

/// Where a project sits in the image -> video -> combine pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Image,
    Video,
    Combining,
    Finished,
}

/// What the UI should present for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    NotStarted,
    Complete,
    Combining,
    ReadyToCombine,
    ReadyForVideo,
    NeedsRetry,
    Paused,
    Processing,
}

/// Inputs that do not come from the segment rows themselves.
#[derive(Debug, Clone, Copy)]
pub struct SummaryContext<'a> {
    pub final_artifact_url: Option<&'a str>,
    /// A combine job for the project is currently polling.
    pub combine_in_flight: bool,
    pub now: Timestamp,
    pub stall_threshold: Duration,
}

/// Everything the UI needs to render one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: DbId,
    /// Kind of the stage the counts below refer to.
    pub kind: SegmentKind,
    pub stage: PipelineStage,
    pub status: ProjectStatus,
    pub stall: StallState,
    pub display: DisplayState,
    /// Every segment of the selected stage failed.
    pub all_failed: bool,
    pub progress_percent: u8,
    pub final_artifact_url: Option<String>,
}

impl ProjectSummary {
    pub fn last_update(&self) -> Option<Timestamp> {
        self.status.last_update
    }
}

impl AsRef<ProjectSummary> for ProjectSummary {
    fn as_ref(&self) -> &ProjectSummary {
        self
    }
}

/// Summarize all of a project's segments as seen at `ctx.now`.
pub fn summarize(project_id: DbId, segments: &[Segment], ctx: SummaryContext<'_>) -> ProjectSummary {
    let group = select_stage(segments);
    let status = aggregate(&group.segments);
    let stall = classify_stall(&status, ctx.now, ctx.stall_threshold);
    let final_artifact_url = ctx
        .final_artifact_url
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string);
    let finished = final_artifact_url.is_some();

    let stage = if finished {
        PipelineStage::Finished
    } else if ctx.combine_in_flight || (group.kind == SegmentKind::Video && status.is_complete) {
        PipelineStage::Combining
    } else {
        match group.kind {
            SegmentKind::Image => PipelineStage::Image,
            SegmentKind::Video => PipelineStage::Video,
        }
    };

    let display = if status.total == 0 && !finished {
        DisplayState::NotStarted
    } else if finished {
        DisplayState::Complete
    } else if ctx.combine_in_flight {
        DisplayState::Combining
    } else if group.kind == SegmentKind::Video && status.is_complete {
        DisplayState::ReadyToCombine
    } else if group.kind == SegmentKind::Image && status.is_complete && !group.has_video {
        DisplayState::ReadyForVideo
    } else if status.has_failed {
        DisplayState::NeedsRetry
    } else if stall == StallState::Stalled {
        DisplayState::Paused
    } else {
        DisplayState::Processing
    };

    ProjectSummary {
        project_id,
        kind: group.kind,
        stage,
        all_failed: status.all_failed(),
        progress_percent: status.progress_percent(),
        status,
        stall,
        display,
        final_artifact_url,
    }
}

/// Whether a project belongs in the dashboard's "active jobs" list.
///
/// Running work always shows. Settled projects that need the user (ready
/// for the video stage, or failed) show only while recent.
pub fn is_dashboard_active(summary: &ProjectSummary, now: Timestamp, window: Duration) -> bool {
    match summary.display {
        DisplayState::NotStarted | DisplayState::Complete | DisplayState::ReadyToCombine => {
            return false;
        }
        DisplayState::Combining => return true,
        _ => {}
    }

    if !summary.status.is_settled() {
        return true;
    }

    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    let recent = summary
        .last_update()
        .is_some_and(|last| now.signed_duration_since(last) < window);

    let needs_user = summary.display == DisplayState::ReadyForVideo || summary.status.failed > 0;
    needs_user && recent
}

/// Sort newest-first by last update; projects never updated go last.
pub fn sort_by_recency<T: AsRef<ProjectSummary>>(items: &mut [T]) {
    items.sort_by(|a, b| b.as_ref().last_update().cmp(&a.as_ref().last_update()));
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::segment::fixtures::*;
    use crate::segment::SegmentStatus;
    use crate::stall::DEFAULT_STALL_THRESHOLD;

    fn ctx() -> SummaryContext<'static> {
        SummaryContext {
            final_artifact_url: None,
            combine_in_flight: false,
            now: epoch(),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }

    #[test]
    fn empty_project_is_not_started() {
        let summary = summarize(7, &[], ctx());
        assert_eq!(summary.display, DisplayState::NotStarted);
        assert_eq!(summary.stage, PipelineStage::Image);
        assert_eq!(summary.project_id, 7);
    }

    #[test]
    fn counts_come_from_the_video_stage() {
        let segments = vec![
            image(1, SegmentStatus::Completed),
            image(2, SegmentStatus::Completed),
            video(3, SegmentStatus::Processing),
        ];
        let summary = summarize(1, &segments, ctx());
        assert_eq!(summary.kind, SegmentKind::Video);
        assert_eq!(summary.stage, PipelineStage::Video);
        assert_eq!(summary.status.total, 1);
        assert_eq!(summary.display, DisplayState::Processing);
    }

    #[test]
    fn finished_images_without_videos_are_ready_for_video() {
        let segments = vec![image(1, SegmentStatus::Completed), image(2, SegmentStatus::Completed)];
        let summary = summarize(1, &segments, ctx());
        assert_eq!(summary.display, DisplayState::ReadyForVideo);
        assert_eq!(summary.stage, PipelineStage::Image);
    }

    #[test]
    fn finished_videos_are_ready_to_combine() {
        let segments = vec![video(1, SegmentStatus::Completed), video(2, SegmentStatus::Completed)];
        let summary = summarize(1, &segments, ctx());
        assert_eq!(summary.display, DisplayState::ReadyToCombine);
        assert_eq!(summary.stage, PipelineStage::Combining);
        assert_eq!(summary.progress_percent, 100);
    }

    #[test]
    fn in_flight_combine_overrides_ready_to_combine() {
        let segments = vec![video(1, SegmentStatus::Completed)];
        let summary = summarize(
            1,
            &segments,
            SummaryContext {
                combine_in_flight: true,
                ..ctx()
            },
        );
        assert_eq!(summary.display, DisplayState::Combining);
    }

    #[test]
    fn final_artifact_means_complete() {
        let segments = vec![video(1, SegmentStatus::Completed)];
        let summary = summarize(
            1,
            &segments,
            SummaryContext {
                final_artifact_url: Some("https://cdn.test/final.mp4"),
                ..ctx()
            },
        );
        assert_eq!(summary.display, DisplayState::Complete);
        assert_eq!(summary.stage, PipelineStage::Finished);
        assert_eq!(
            summary.final_artifact_url.as_deref(),
            Some("https://cdn.test/final.mp4")
        );
    }

    #[test]
    fn settled_failures_need_retry_before_paused() {
        let segments = vec![video(1, SegmentStatus::Completed), video(2, SegmentStatus::Failed)];
        let summary = summarize(1, &segments, ctx());
        assert_eq!(summary.stall, StallState::Stalled);
        assert_eq!(summary.display, DisplayState::NeedsRetry);
        assert!(!summary.all_failed);
    }

    #[test]
    fn silent_running_project_is_paused() {
        let segments = vec![
            segment(1, SegmentKind::Video, SegmentStatus::Completed, 600),
            segment(2, SegmentKind::Video, SegmentStatus::Processing, 300),
        ];
        let summary = summarize(1, &segments, ctx());
        assert_eq!(summary.display, DisplayState::Paused);
    }

    #[test]
    fn dashboard_lists_running_work() {
        let summary = summarize(1, &[video(1, SegmentStatus::Processing)], ctx());
        assert!(is_dashboard_active(&summary, epoch(), DEFAULT_ACTIVE_LISTING_WINDOW));
    }

    #[test]
    fn dashboard_hides_ready_to_combine_and_complete() {
        let ready = summarize(1, &[video(1, SegmentStatus::Completed)], ctx());
        assert!(!is_dashboard_active(&ready, epoch(), DEFAULT_ACTIVE_LISTING_WINDOW));

        let done = summarize(
            1,
            &[video(1, SegmentStatus::Completed)],
            SummaryContext {
                final_artifact_url: Some("https://cdn.test/final.mp4"),
                ..ctx()
            },
        );
        assert!(!is_dashboard_active(&done, epoch(), DEFAULT_ACTIVE_LISTING_WINDOW));
    }

    #[test]
    fn dashboard_drops_old_failures() {
        let segments = vec![segment(1, SegmentKind::Video, SegmentStatus::Failed, 10)];
        let summary = summarize(1, &segments, ctx());
        assert!(is_dashboard_active(&summary, epoch(), DEFAULT_ACTIVE_LISTING_WINDOW));

        let two_hours_later = epoch() + ChronoDuration::hours(2);
        assert!(!is_dashboard_active(
            &summary,
            two_hours_later,
            DEFAULT_ACTIVE_LISTING_WINDOW
        ));
    }

    #[test]
    fn recency_sort_puts_unstarted_last() {
        let fresh = summarize(1, &[segment(1, SegmentKind::Video, SegmentStatus::Processing, 1)], ctx());
        let stale = summarize(2, &[segment(2, SegmentKind::Video, SegmentStatus::Processing, 500)], ctx());
        let empty = summarize(3, &[], ctx());
        let mut list = vec![empty, stale, fresh];
        sort_by_recency(&mut list);
        let ids: Vec<_> = list.iter().map(|s| s.project_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}

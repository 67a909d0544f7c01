//! Stage selection for projects with segments in more than one pipeline
//! stage. A project that reached video generation has by construction
//! finished its image stage, so video always wins.

use crate::segment::{Segment, SegmentKind};

/// The segments of the single stage chosen to represent a project.
#[derive(Debug, Clone, PartialEq)]
pub struct StageGroup {
    pub kind: SegmentKind,
    pub segments: Vec<Segment>,
    /// Whether any segment of the later (video) stage exists at all.
    pub has_video: bool,
}

/// Group `segments` by kind and pick the Video group if it is non-empty,
/// otherwise the Image group. Input order is preserved within the group.
pub fn select_stage(segments: &[Segment]) -> StageGroup {
    let (video, image): (Vec<Segment>, Vec<Segment>) = segments
        .iter()
        .cloned()
        .partition(|s| s.kind == SegmentKind::Video);

    if video.is_empty() {
        StageGroup {
            kind: SegmentKind::Image,
            segments: image,
            has_video: false,
        }
    } else {
        StageGroup {
            kind: SegmentKind::Video,
            segments: video,
            has_video: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::fixtures::*;
    use crate::segment::SegmentStatus;

    #[test]
    fn video_dominates_image() {
        let segments = vec![
            image(1, SegmentStatus::Completed),
            video(2, SegmentStatus::Processing),
            image(3, SegmentStatus::Completed),
            video(4, SegmentStatus::Pending),
        ];
        let group = select_stage(&segments);
        assert_eq!(group.kind, SegmentKind::Video);
        assert!(group.has_video);
        let ids: Vec<_> = group.segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn image_only_project_reports_image() {
        let segments = vec![image(1, SegmentStatus::Pending), image(2, SegmentStatus::Completed)];
        let group = select_stage(&segments);
        assert_eq!(group.kind, SegmentKind::Image);
        assert!(!group.has_video);
        assert_eq!(group.segments.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_image_group() {
        let group = select_stage(&[]);
        assert_eq!(group.kind, SegmentKind::Image);
        assert!(group.segments.is_empty());
    }
}

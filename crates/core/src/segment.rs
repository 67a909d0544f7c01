//! Segment model: one unit of generation work (one image or one video clip).
//!
//! Status and kind discriminants match the encoding used by the external
//! generation service and the `segment_statuses` / `segment_kinds` seed data.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database ID back to the enum, if it is known.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                Self::from_id(id).ok_or_else(|| {
                    CoreError::Internal(format!(
                        "Unknown {} id {id}",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

define_status_enum! {
    /// Segment generation status as reported by the generation workers.
    SegmentStatus {
        Pending = 0,
        Processing = 1,
        Completed = 2,
        Failed = 3,
    }
}

define_status_enum! {
    /// Pipeline stage a segment belongs to. Later stages dominate earlier ones.
    SegmentKind {
        Image = 1,
        Video = 2,
    }
}

impl SegmentStatus {
    /// `Completed` and `Failed` are final until an explicit reset.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Label used in the combine payload when a segment has none.
pub const DEFAULT_SEGMENT_LABEL: &str = "SEGMENT";

/// Duration assumed for a clip whose length was never reported.
pub const DEFAULT_SEGMENT_DURATION_SECS: f64 = 8.0;

/// A single generation unit belonging to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: DbId,
    pub project_id: DbId,
    pub kind: SegmentKind,
    /// Playback order within the project and stage.
    pub sequence_index: i32,
    pub status: SegmentStatus,
    /// Set only when `status` is `Completed`.
    pub artifact_url: Option<String>,
    /// Set only when `status` is `Failed`.
    pub error: Option<String>,
    /// Free-text role of the clip (hook, body, call-to-action...).
    pub label: Option<String>,
    pub duration_secs: Option<f64>,
    pub created_at: Timestamp,
    /// Authoritative "last heard from" signal.
    pub updated_at: Timestamp,
}

impl Segment {
    /// Artifact URL if the segment completed with a non-empty one.
    pub fn usable_artifact(&self) -> Option<&str> {
        match (self.status, self.artifact_url.as_deref()) {
            (SegmentStatus::Completed, Some(url)) if !url.trim().is_empty() => Some(url),
            _ => None,
        }
    }

    /// Check the field invariants: an artifact iff completed, an error iff
    /// failed.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let has_artifact = self.artifact_url.is_some();
        let has_error = self.error.is_some();
        if has_artifact != (self.status == SegmentStatus::Completed) {
            return Err(CoreError::Validation(format!(
                "Segment {} has status {:?} but artifact_url presence is {has_artifact}",
                self.id, self.status
            )));
        }
        if has_error != (self.status == SegmentStatus::Failed) {
            return Err(CoreError::Validation(format!(
                "Segment {} has status {:?} but error presence is {has_error}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn status_ids_match_service_encoding() {
        assert_eq!(SegmentStatus::Pending.id(), 0);
        assert_eq!(SegmentStatus::Processing.id(), 1);
        assert_eq!(SegmentStatus::Completed.id(), 2);
        assert_eq!(SegmentStatus::Failed.id(), 3);
    }

    #[test]
    fn unknown_status_id_is_rejected() {
        assert!(SegmentStatus::try_from(7).is_err());
        assert_eq!(SegmentStatus::try_from(2).unwrap(), SegmentStatus::Completed);
    }

    #[test]
    fn kind_round_trips_through_id() {
        let id: StatusId = SegmentKind::Video.into();
        assert_eq!(SegmentKind::from_id(id), Some(SegmentKind::Video));
        assert_eq!(SegmentKind::from_id(0), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(SegmentStatus::Completed.is_terminal());
        assert!(SegmentStatus::Failed.is_terminal());
        assert!(!SegmentStatus::Pending.is_terminal());
        assert!(!SegmentStatus::Processing.is_terminal());
    }

    #[test]
    fn fixtures_satisfy_invariants() {
        for status in [
            SegmentStatus::Pending,
            SegmentStatus::Processing,
            SegmentStatus::Completed,
            SegmentStatus::Failed,
        ] {
            video(1, status).check_invariants().unwrap();
        }
    }

    #[test]
    fn artifact_on_pending_segment_violates_invariant() {
        let mut seg = video(1, SegmentStatus::Pending);
        seg.artifact_url = Some("https://cdn.test/x.mp4".into());
        assert!(seg.check_invariants().is_err());
    }

    #[test]
    fn blank_artifact_is_not_usable() {
        let mut seg = video(1, SegmentStatus::Completed);
        seg.artifact_url = Some("   ".into());
        assert_eq!(seg.usable_artifact(), None);
    }
}

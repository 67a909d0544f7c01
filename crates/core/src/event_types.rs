//! Event type constants published on the in-process event bus.
//!
//! Used by the engine when reporting combine lifecycle changes and by the
//! realtime feed bridge when a segment row changes.

/// A segment row of a project was inserted or updated.
pub const EVENT_SEGMENT_UPDATED: &str = "segment.updated";

/// The combination service accepted a request and returned a job id.
pub const EVENT_COMBINE_SUBMITTED: &str = "combine.submitted";

/// A poll tick changed progress or step text.
pub const EVENT_COMBINE_PROGRESS: &str = "combine.progress";

/// The combine job finished with a final artifact.
pub const EVENT_COMBINE_COMPLETED: &str = "combine.completed";

/// The combination service reported a terminal failure.
pub const EVENT_COMBINE_FAILED: &str = "combine.failed";

/// The attempt ceiling was reached without a terminal report.
pub const EVENT_COMBINE_TIMED_OUT: &str = "combine.timed_out";

/// The local polling loop was cancelled.
pub const EVENT_COMBINE_CANCELLED: &str = "combine.cancelled";

/// The final artifact URL was recorded on the project.
pub const EVENT_PROJECT_FINALIZED: &str = "project.finalized";

pub mod project_repo;
pub mod segment_repo;

pub use project_repo::ProjectRepo;
pub use segment_repo::SegmentRepo;

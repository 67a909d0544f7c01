pub mod combine;
pub mod combine_job;
pub mod error;
pub mod event_types;
pub mod rollup;
pub mod segment;
pub mod stage;
pub mod stall;
pub mod store;
pub mod summary;
pub mod types;

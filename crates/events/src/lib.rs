//! Montage event bus and realtime segment feed.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`EngineEvent`]: the event envelope, always scoped to a project.
//! - [`SegmentFeed`]: bridges Postgres `NOTIFY` on segment changes onto the
//!   bus, reconnecting with exponential backoff.

pub mod bus;
pub mod feed;
pub mod reconnect;

pub use bus::{EngineEvent, EventBus};
pub use feed::SegmentFeed;
pub use reconnect::ReconnectConfig;

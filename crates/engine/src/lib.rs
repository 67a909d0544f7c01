//! Stateful side of the engine: combine orchestration and polling, the
//! persistence writer, and project summaries (one-shot and watched).

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod summary;
pub mod watcher;
pub mod writer;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use orchestrator::CombineOrchestrator;
pub use poller::CombinePoller;
pub use summary::{ProjectOverview, SummaryService};
pub use watcher::ProjectWatcher;
pub use writer::PersistenceWriter;

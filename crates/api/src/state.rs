use std::sync::Arc;

use montage_core::store::{CombineService, CompletionStore, SegmentSource};
use montage_engine::{CombineOrchestrator, SummaryService};
use montage_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Owns every project's combine job and its polling task.
    pub combines: Arc<CombineOrchestrator>,
    /// History, dashboard and per-project summaries.
    pub summaries: Arc<SummaryService>,
    /// Centralized event bus for engine events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the engine over the given storage and combination service.
    pub fn new<S>(
        config: ServerConfig,
        store: Arc<S>,
        service: Arc<dyn CombineService>,
        event_bus: Arc<EventBus>,
    ) -> Self
    where
        S: SegmentSource + CompletionStore + 'static,
    {
        let source: Arc<dyn SegmentSource> = store.clone();
        let completions: Arc<dyn CompletionStore> = store;

        let combines = Arc::new(CombineOrchestrator::new(
            Arc::clone(&source),
            completions,
            service,
            Arc::clone(&event_bus),
            &config.engine,
        ));
        let summaries = Arc::new(SummaryService::new(
            source,
            Arc::clone(&combines),
            &config.engine,
        ));

        Self {
            config: Arc::new(config),
            combines,
            summaries,
            event_bus,
        }
    }
}

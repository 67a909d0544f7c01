//! Per-project watcher: keeps a live summary in a `watch` channel.
//!
//! The summary is recomputed whenever an event for the project arrives on
//! the bus, and on a fixed refresh interval regardless, since the feed may
//! drop notifications.

use std::sync::Arc;
use std::time::Duration;

use montage_core::types::DbId;
use montage_events::{EngineEvent, EventBus};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::summary::{ProjectOverview, SummaryService};

pub struct ProjectWatcher {
    pub summary: watch::Receiver<Option<ProjectOverview>>,
    pub task: JoinHandle<()>,
}

impl ProjectWatcher {
    /// Start watching `project_id` until `cancel` fires.
    ///
    /// The receiver holds `None` until the first summary is computed, and
    /// again if the project disappears.
    pub fn spawn(
        project_id: DbId,
        summaries: Arc<SummaryService>,
        bus: &EventBus,
        refresh: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, summary) = watch::channel(None);
        let events = bus.subscribe();
        let task = tokio::spawn(watch_project(project_id, summaries, events, refresh, tx, cancel));
        Self { summary, task }
    }
}

async fn watch_project(
    project_id: DbId,
    summaries: Arc<SummaryService>,
    mut events: broadcast::Receiver<EngineEvent>,
    refresh: Duration,
    tx: watch::Sender<Option<ProjectOverview>>,
    cancel: CancellationToken,
) {
    tracing::debug!(project_id, refresh_secs = refresh.as_secs(), "Project watcher started");

    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            event = events.recv() => match event {
                Ok(event) if event.project_id == project_id => {
                    tracing::debug!(project_id, event_type = %event.event_type, "Project event");
                    ticker.reset();
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(project_id, skipped, "Watcher lagged, refreshing");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(project_id, "Event bus closed, watcher stopping");
                    break;
                }
            },
        }

        match summaries.project_summary(project_id).await {
            Ok(overview) => {
                tx.send_if_modified(|current| {
                    if current.as_ref() == Some(&overview) {
                        false
                    } else {
                        *current = Some(overview);
                        true
                    }
                });
            }
            Err(EngineError::NotFound { .. }) => {
                tx.send_if_modified(|current| current.take().is_some());
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Summary refresh failed, keeping last value");
            }
        }
    }

    tracing::debug!(project_id, "Project watcher stopped");
}

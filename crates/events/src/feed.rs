//! Realtime segment feed: Postgres `NOTIFY` -> [`EventBus`].
//!
//! A trigger on `segments` calls `pg_notify('segment_changes', project_id)`
//! on every insert or update. [`SegmentFeed`] listens on that channel and
//! republishes each notification as a `segment.updated` event. Delivery is
//! best effort: notifications sent while the listener is reconnecting are
//! lost, so consumers also re-read on a timer.

use std::sync::Arc;

use montage_core::event_types::EVENT_SEGMENT_UPDATED;
use montage_core::types::DbId;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::bus::{EngineEvent, EventBus};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Channel name used by the segment change trigger.
pub const SEGMENT_CHANNEL: &str = "segment_changes";

/// Parse a notification payload into a project id.
pub fn parse_notification(payload: &str) -> Option<DbId> {
    payload.trim().parse().ok()
}

/// Bridges segment change notifications onto the event bus.
pub struct SegmentFeed {
    pool: PgPool,
    bus: Arc<EventBus>,
    reconnect: ReconnectConfig,
}

impl SegmentFeed {
    pub fn new(pool: PgPool, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            bus,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(channel = SEGMENT_CHANNEL, "Segment feed started");

        'connect: loop {
            let Some(mut listener) =
                reconnect_loop(&self.pool, SEGMENT_CHANNEL, &self.reconnect, &cancel).await
            else {
                break;
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'connect,
                    result = listener.recv() => match result {
                        Ok(notification) => self.forward(notification.payload()),
                        Err(e) => {
                            tracing::warn!(error = %e, "Segment feed listener dropped");
                            continue 'connect;
                        }
                    },
                }
            }
        }

        tracing::info!("Segment feed stopped");
    }

    fn forward(&self, payload: &str) {
        match parse_notification(payload) {
            Some(project_id) => {
                tracing::debug!(project_id, "Segment change notification");
                self.bus
                    .publish(EngineEvent::new(EVENT_SEGMENT_UPDATED, project_id));
            }
            None => tracing::warn!(payload, "Ignoring malformed segment notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_a_project_id() {
        assert_eq!(parse_notification("42"), Some(42));
        assert_eq!(parse_notification(" 7\n"), Some(7));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert_eq!(parse_notification(""), None);
        assert_eq!(parse_notification("project-42"), None);
    }

    #[tokio::test]
    async fn forward_publishes_segment_updated() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let pool = PgPool::connect_lazy("postgres://montage@127.0.0.1:1/montage").unwrap();
        let feed = SegmentFeed::new(pool, Arc::clone(&bus));

        feed.forward("nope");
        feed.forward("12");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_SEGMENT_UPDATED);
        assert_eq!(event.project_id, 12);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_returns_once_cancelled() {
        let pool = PgPool::connect_lazy("postgres://montage@127.0.0.1:1/montage").unwrap();
        let feed = SegmentFeed::new(pool, Arc::new(EventBus::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        feed.run(cancel).await;
    }
}

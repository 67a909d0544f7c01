//! Exponential-backoff reconnection for the Postgres `LISTEN` connection.
//!
//! When the listener drops, the feed calls [`reconnect_loop`] to keep
//! retrying with increasing delays until either a listener is subscribed
//! again or the [`CancellationToken`] is triggered.

use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Open a listener on `channel`.
pub async fn listen(pool: &PgPool, channel: &str) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(channel).await?;
    Ok(listener)
}

/// Open a listener on `channel`, retrying with exponential backoff.
///
/// Returns `None` if `cancel` fires before a listener is established.
pub async fn reconnect_loop(
    pool: &PgPool,
    channel: &str,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<PgListener> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tracing::info!(channel, attempt, "Connecting segment feed listener");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(channel, "Feed reconnect cancelled");
                return None;
            }
            result = listen(pool, channel) => {
                match result {
                    Ok(listener) => {
                        tracing::info!(channel, attempt, "Segment feed listener connected");
                        return Some(listener);
                    }
                    Err(e) => {
                        tracing::warn!(
                            channel,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Feed connect attempt {attempt} failed",
                        );
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

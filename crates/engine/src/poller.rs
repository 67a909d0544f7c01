//! Combine poller: one sequential status-query loop per combine job.
//!
//! Ticks are strictly sequential: the next interval only starts counting
//! once the previous query answered or hit `status_timeout`. A failed or
//! hung query consumes an attempt and is otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use montage_core::combine_job::CombineJob;
use montage_core::event_types::EVENT_COMBINE_PROGRESS;
use montage_core::store::CombineService;
use montage_events::{EngineEvent, EventBus};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;

pub struct CombinePoller {
    service: Arc<dyn CombineService>,
    bus: Arc<EventBus>,
    interval: Duration,
    max_attempts: u32,
    status_timeout: Duration,
}

impl CombinePoller {
    pub fn new(service: Arc<dyn CombineService>, bus: Arc<EventBus>, config: &EngineConfig) -> Self {
        Self {
            service,
            bus,
            interval: config.poll_interval,
            max_attempts: config.max_attempts,
            status_timeout: config.status_timeout,
        }
    }

    /// Run a single tick against `job`. Returns `true` once the job is terminal.
    pub async fn poll(&self, job: &mut CombineJob) -> bool {
        let result = tokio::time::timeout(self.status_timeout, self.service.status(&job.job_id)).await;

        match result {
            Ok(Ok(report)) => job.apply_report(report, self.max_attempts, Utc::now()),
            Ok(Err(e)) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = job.attempts + 1,
                    error = %e,
                    "Combine status query failed, retrying next tick",
                );
                job.record_transient_failure(self.max_attempts, Utc::now())
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = job.attempts + 1,
                    timeout_secs = self.status_timeout.as_secs(),
                    "Combine status query timed out, retrying next tick",
                );
                job.record_transient_failure(self.max_attempts, Utc::now())
            }
        }
    }

    /// Drive `job` until it is terminal or `cancel` fires.
    ///
    /// Every non-terminal snapshot is sent on `tx`. The terminal job is
    /// returned to the caller unsent so it can finish any hand-off first.
    pub async fn run(
        &self,
        mut job: CombineJob,
        tx: &watch::Sender<CombineJob>,
        cancel: &CancellationToken,
    ) -> CombineJob {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    job.cancel(Utc::now());
                    return job;
                }
                _ = ticker.tick() => {}
            }

            let previous = (job.progress_percent, job.current_step.clone());
            let done = tokio::select! {
                _ = cancel.cancelled() => None,
                done = self.poll(&mut job) => Some(done),
            };
            let Some(done) = done else {
                job.cancel(Utc::now());
                return job;
            };
            if done {
                return job;
            }
            // Count the next interval from the end of this tick.
            ticker.reset();

            tracing::debug!(
                job_id = %job.job_id,
                attempt = job.attempts,
                progress = job.progress_percent,
                step = %job.current_step,
                "Combine poll tick",
            );

            if previous != (job.progress_percent, job.current_step.clone()) {
                self.bus.publish(
                    EngineEvent::new(EVENT_COMBINE_PROGRESS, job.project_id)
                        .with_job(job.job_id.clone())
                        .with_payload(serde_json::json!({
                            "progress_percent": job.progress_percent,
                            "current_step": job.current_step,
                            "attempts": job.attempts,
                        })),
                );
            }
            tx.send_replace(job.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use montage_core::combine_job::{CombineState, TIMEOUT_MESSAGE};
    use montage_core::store::CombineServiceError;

    use super::*;
    use crate::testing::{completed, failed, in_progress, ScriptStep, ScriptedCombineService};

    fn setup(service: ScriptedCombineService, max_attempts: u32) -> (Arc<ScriptedCombineService>, CombinePoller) {
        let service = Arc::new(service);
        let config = EngineConfig {
            max_attempts,
            ..EngineConfig::default()
        };
        let poller = CombinePoller::new(service.clone(), Arc::new(EventBus::default()), &config);
        (service, poller)
    }

    fn job() -> CombineJob {
        CombineJob::new("job_1", 1, Utc::now())
    }

    async fn drive(poller: &CombinePoller) -> CombineJob {
        let job = job();
        let (tx, _rx) = watch::channel(job.clone());
        poller.run(job, &tx, &CancellationToken::new()).await
    }

    #[tokio::test(start_paused = true)]
    async fn single_tick_applies_report() {
        let (_, poller) = setup(
            ScriptedCombineService::with_script([ScriptStep::Report(in_progress(Some(25.0)))]),
            120,
        );
        let mut job = job();
        assert!(!poller.poll(&mut job).await);
        assert_eq!(job.state, CombineState::Polling);
        assert_eq!(job.progress_percent, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_attempt_ceiling() {
        let script = (0..121).map(|_| ScriptStep::Report(in_progress(None)));
        let (service, poller) = setup(ScriptedCombineService::with_script(script), 120);

        let job = drive(&poller).await;
        assert_eq!(job.state, CombineState::TimedOut);
        assert_eq!(job.attempts, 120);
        assert_eq!(job.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(service.status_calls(), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_absorbed() {
        let (service, poller) = setup(
            ScriptedCombineService::with_script([
                ScriptStep::Error(CombineServiceError::Transport("connection reset".into())),
                ScriptStep::Report(in_progress(Some(50.0))),
                ScriptStep::Error(CombineServiceError::Rejected {
                    status: 503,
                    body: "busy".into(),
                }),
                ScriptStep::Report(completed("https://cdn.test/final.mp4")),
            ]),
            120,
        );

        let job = drive(&poller).await;
        assert_eq!(job.state, CombineState::Completed);
        assert_eq!(job.attempts, 4);
        assert_eq!(service.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_query_times_out_without_stalling_the_loop() {
        let (_, poller) = setup(
            ScriptedCombineService::with_script([
                ScriptStep::Hang,
                ScriptStep::Report(failed("encoder crashed")),
            ]),
            120,
        );

        let started = Instant::now();
        let job = drive(&poller).await;
        assert_eq!(job.state, CombineState::Failed);
        assert_eq!(job.error.as_deref(), Some("encoder crashed"));
        assert_eq!(job.attempts, 2);
        // interval + status timeout + interval
        assert_eq!(started.elapsed(), Duration::from_secs(5 + 10 + 5));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_snapshots_never_decrease() {
        let (_, poller) = setup(
            ScriptedCombineService::with_script([
                ScriptStep::Report(in_progress(Some(40.0))),
                ScriptStep::Report(in_progress(Some(20.0))),
                ScriptStep::Report(in_progress(None)),
                ScriptStep::Report(in_progress(Some(75.0))),
                ScriptStep::Report(completed("https://cdn.test/final.mp4")),
            ]),
            120,
        );
        let job = job();
        let (tx, mut rx) = watch::channel(job.clone());
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                seen.push(rx.borrow_and_update().progress_percent);
            }
            seen
        });

        let finished = poller.run(job, &tx, &CancellationToken::new()).await;
        drop(tx);
        let seen = observer.await.unwrap();

        assert_eq!(finished.progress_percent, 100);
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_ticks() {
        let (service, poller) = setup(ScriptedCombineService::new(), 120);
        let cancel = CancellationToken::new();
        let job = job();
        let (tx, _rx) = watch::channel(job.clone());

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(12)).await;
                cancel.cancel();
            })
        };
        let job = poller.run(job, &tx, &cancel).await;
        canceller.await.unwrap();

        assert_eq!(job.state, CombineState::Cancelled);
        assert_eq!(service.status_calls(), 2);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.status_calls(), 2);
    }
}

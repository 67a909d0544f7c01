use std::str::FromStr;
use std::time::Duration;

use montage_core::combine_job::DEFAULT_MAX_ATTEMPTS;
use montage_core::stall::DEFAULT_STALL_THRESHOLD;
use montage_core::summary::DEFAULT_ACTIVE_LISTING_WINDOW;

/// An environment variable was set to something unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },

    #[error("{var} has invalid value {value:?}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Read `var` and parse it, falling back to `default` when unset.
pub fn env_or<T: FromStr>(var: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
        Err(_) => Ok(default),
    }
}

/// Read a required, non-empty `var`.
pub fn env_required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn env_secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = env_or(var, default.as_secs(), "whole seconds")?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: "0".into(),
            expected: "a positive number of seconds",
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Timing and threshold knobs for the aggregation and combine engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Silence after which an unfinished project counts as stalled.
    pub stall_threshold: Duration,
    /// Delay between combine status polls.
    pub poll_interval: Duration,
    /// Poll attempts before a combine job times out.
    pub max_attempts: u32,
    /// Upper bound on a single status query.
    pub status_timeout: Duration,
    /// Upper bound on the submit call to the combination service.
    pub submit_timeout: Duration,
    /// Periodic summary re-read when no feed event arrives.
    pub summary_refresh: Duration,
    /// How long settled projects stay on the dashboard.
    pub active_listing_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            poll_interval: Duration::from_secs(5),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            status_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(30),
            summary_refresh: Duration::from_secs(10),
            active_listing_window: DEFAULT_ACTIVE_LISTING_WINDOW,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `STALL_THRESHOLD_SECS`        | `120`   |
    /// | `COMBINE_POLL_INTERVAL_SECS`  | `5`     |
    /// | `COMBINE_MAX_ATTEMPTS`        | `120`   |
    /// | `COMBINE_STATUS_TIMEOUT_SECS` | `10`    |
    /// | `COMBINE_SUBMIT_TIMEOUT_SECS` | `30`    |
    /// | `SUMMARY_REFRESH_SECS`        | `10`    |
    /// | `ACTIVE_LISTING_WINDOW_SECS`  | `3600`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_attempts = env_or("COMBINE_MAX_ATTEMPTS", defaults.max_attempts, "a positive integer")?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "COMBINE_MAX_ATTEMPTS",
                value: "0".into(),
                expected: "a positive integer",
            });
        }

        Ok(Self {
            stall_threshold: env_secs("STALL_THRESHOLD_SECS", defaults.stall_threshold)?,
            poll_interval: env_secs("COMBINE_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            max_attempts,
            status_timeout: env_secs("COMBINE_STATUS_TIMEOUT_SECS", defaults.status_timeout)?,
            submit_timeout: env_secs("COMBINE_SUBMIT_TIMEOUT_SECS", defaults.submit_timeout)?,
            summary_refresh: env_secs("SUMMARY_REFRESH_SECS", defaults.summary_refresh)?,
            active_listing_window: env_secs(
                "ACTIVE_LISTING_WINDOW_SECS",
                defaults.active_listing_window,
            )?,
        })
    }
}

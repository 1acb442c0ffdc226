use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::schedule::DelaySchedule;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_UNKNOWN_STATUS_TOLERANCE: u32 = 2;
pub const DEFAULT_NOT_FOUND_TOLERANCE: u32 = 20;

/// Per-invocation waiter parameters.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Sleep before the first probe.
    pub initial_delay: Duration,
    /// Delay between probes, before growth.
    pub poll_interval: Duration,
    /// Interval multiplier after every probe; 1.0 keeps it fixed.
    pub backoff_factor: f64,
    /// Cap for the grown interval.
    pub max_interval: Duration,
    /// Fraction (0.0 - 1.0) of random spread applied to every delay.
    pub jitter: f64,
    /// Overall budget for the wait.
    pub timeout: Duration,
    /// Consecutive statuses outside the table tolerated before giving up.
    pub unknown_status_tolerance: u32,
    /// Consecutive "not found" observations tolerated while the entity is
    /// expected to exist.
    pub not_found_tolerance: u32,
    /// Consecutive target observations required before success.
    pub target_occurrences: u32,
    pub cancel: CancellationToken,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff_factor: 1.0,
            max_interval: DEFAULT_MAX_INTERVAL,
            jitter: 0.0,
            timeout: DEFAULT_TIMEOUT,
            unknown_status_tolerance: DEFAULT_UNKNOWN_STATUS_TOLERANCE,
            not_found_tolerance: DEFAULT_NOT_FOUND_TOLERANCE,
            target_occurrences: 1,
            cancel: CancellationToken::new(),
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_unknown_status_tolerance(mut self, tolerance: u32) -> Self {
        self.unknown_status_tolerance = tolerance;
        self
    }

    pub fn with_not_found_tolerance(mut self, tolerance: u32) -> Self {
        self.not_found_tolerance = tolerance;
        self
    }

    pub fn with_target_occurrences(mut self, occurrences: u32) -> Self {
        self.target_occurrences = occurrences.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn schedule(&self) -> DelaySchedule {
        let max = if self.backoff_factor > 1.0 {
            self.max_interval.max(self.poll_interval)
        } else {
            self.poll_interval
        };
        DelaySchedule::new(self.poll_interval, self.backoff_factor, max, self.jitter)
    }
}

//! Transient-error retry with exponential backoff.
//!
//! Used around mutation calls before a wait starts, and optionally around
//! every status probe via [`RetryingProbe`]. Which errors count as transient
//! is decided by a [`TransientClassifier`] supplied by the resource adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::waiter::{DelaySchedule, Observation, StatusProbe};

/// Decides whether an error is worth retrying.
pub trait TransientClassifier: Send + Sync {
    fn is_transient(&self, err: &anyhow::Error) -> bool;
}

impl<F> TransientClassifier for F
where
    F: Fn(&anyhow::Error) -> bool + Send + Sync,
{
    fn is_transient(&self, err: &anyhow::Error) -> bool {
        self(err)
    }
}

pub fn always_transient(_err: &anyhow::Error) -> bool {
    true
}

pub fn never_transient(_err: &anyhow::Error) -> bool {
    false
}

/// Default random spread on retry delays.
pub const DEFAULT_JITTER: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction (0.0 - 1.0) of random spread applied to every delay.
    pub jitter: f64,
    /// Stop retrying once the next attempt would start after this budget.
    pub max_elapsed: Option<Duration>,
    /// Cuts a pending backoff sleep short.
    pub cancel: CancellationToken,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: DEFAULT_JITTER,
            max_elapsed: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = Some(budget);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn schedule(&self) -> DelaySchedule {
        DelaySchedule::new(
            self.initial_delay,
            self.multiplier,
            self.max_delay.max(self.initial_delay),
            self.jitter,
        )
    }

    /// Runs `operation` until it succeeds, fails permanently, or the
    /// attempt/elapsed budget is spent. Permanent errors come back
    /// unchanged; an exhausted budget or a cancelled backoff wraps the last
    /// error with context.
    pub async fn retry<F, Fut, T, C>(
        &self,
        operation_name: &str,
        classifier: &C,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: TransientClassifier + ?Sized,
    {
        let started = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut schedule = self.schedule();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !classifier.is_transient(&e) {
                        debug!(operation = operation_name, attempt, error = %e, "Permanent error, not retrying");
                        return Err(e);
                    }

                    let delay = schedule.next_delay();
                    let within_budget = self
                        .max_elapsed
                        .map_or(true, |budget| started.elapsed() + delay <= budget);

                    if attempt >= max_attempts || !within_budget {
                        return Err(e).context(format!(
                            "{} failed after {} attempts",
                            operation_name, attempt
                        ));
                    }

                    info!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation_name, attempt, max_attempts, delay, e
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            info!("{} cancelled during backoff", operation_name);
                            return Err(e).context(format!(
                                "{} cancelled after {} attempts",
                                operation_name, attempt
                            ));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Status probe whose transient faults are retried before they reach the
/// waiter.
pub struct RetryingProbe<P, C> {
    inner: P,
    policy: RetryPolicy,
    classifier: C,
}

impl<P, C> RetryingProbe<P, C> {
    pub fn new(inner: P, policy: RetryPolicy, classifier: C) -> Self {
        Self {
            inner,
            policy,
            classifier,
        }
    }
}

#[async_trait]
impl<P, C> StatusProbe for RetryingProbe<P, C>
where
    P: StatusProbe,
    C: TransientClassifier,
{
    type Snapshot = P::Snapshot;

    async fn probe(&self, id: &str) -> Result<Observation<Self::Snapshot>> {
        self.policy
            .retry("status probe", &self.classifier, || self.inner.probe(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("throttled")]
    struct Throttled;

    fn throttled_only(err: &anyhow::Error) -> bool {
        err.downcast_ref::<Throttled>().is_some()
    }

    fn quick_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(40))
            .with_jitter(0.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);

        let result = quick_policy(5)
            .retry("create entity", &throttled_only, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow::Error::new(Throttled))
                } else {
                    Ok("created")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "created");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = quick_policy(5)
            .retry("create entity", &throttled_only, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("AccessDenied"))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "AccessDenied");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_transient_makes_one_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = quick_policy(5)
            .retry("create entity", &never_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = quick_policy(4)
            .retry("create entity", &always_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.to_string(), "create entity failed after 4 attempts");
        assert!(err.downcast_ref::<Throttled>().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_grow() {
        let started = Instant::now();
        let calls = AtomicU32::new(0);

        let _: Result<()> = quick_policy(4)
            .retry("create entity", &always_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;

        // 10ms + 20ms + 40ms between the four attempts
        assert_eq!(started.elapsed(), Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_budget_stops_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = quick_policy(100)
            .with_max_elapsed(Duration::from_millis(35))
            .retry("create entity", &always_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;

        assert!(result.is_err());
        // attempts at 0ms, 10ms, 30ms; the next would start at 70ms
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_policy() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::none()
            .retry("create entity", &always_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_policy_is_jittered() {
        let policy = RetryPolicy::default();
        assert!(policy.jitter > 0.0);

        let nominal = [1000.0, 2000.0, 4000.0];
        let mut distinct = std::collections::HashSet::new();
        for _ in 0..50 {
            let delays: Vec<Duration> = policy.schedule().take(3).collect();
            for (delay, nominal) in delays.iter().zip(nominal) {
                let ms = delay.as_secs_f64() * 1000.0;
                assert!(ms >= nominal * 0.8 - 1.0 && ms <= nominal * 1.2 + 1.0, "{:?}", delay);
            }
            distinct.insert(delays[0]);
        }
        assert!(distinct.len() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_cuts_backoff_short() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let policy = quick_policy(5)
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(30))
            .with_cancellation(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let started = Instant::now();
        let result: Result<()> = policy
            .retry("delete entity", &always_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::Error::new(Throttled))
            })
            .await;
        canceller.await.unwrap();

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "delete entity cancelled after 1 attempts");
        assert!(err.downcast_ref::<Throttled>().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_probe() {
        let calls = AtomicU32::new(0);
        let inner = crate::waiter::probe_fn(|_id: String| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::Error::new(Throttled))
                } else {
                    Ok(Observation::new(n, "AVAILABLE"))
                }
            }
        });
        let probe = RetryingProbe::new(inner, quick_policy(3), throttled_only);

        let obs = probe.probe("db-1").await.unwrap();
        assert_eq!(obs.snapshot, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Poll-until-converged waiter.
//!
//! A mutation against an eventually consistent API is issued once; [`wait`]
//! then polls a [`StatusProbe`] until the entity reaches a status in the
//! [`TransitionTable`]'s target set, reports a failure status, stops being
//! recognisable, times out, or the caller cancels.
//!
//! ```rust,no_run
//! use converge::waiter::{probe_fn, wait, Observation, TransitionTable, WaitConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let probe = probe_fn(|id: String| async move {
//!     // ask the remote API about `id`
//!     Ok::<_, anyhow::Error>(Observation::new(id, "AVAILABLE"))
//! });
//! let table = TransitionTable::new()
//!     .pending(["PENDING"])
//!     .target(["AVAILABLE"])
//!     .failure(["FAILED"]);
//! let config = WaitConfig::new(Duration::from_secs(600));
//!
//! let done = wait(&config, &probe, "db-1", &table).await?;
//! println!("{:?}", done.snapshot);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod probe;
pub mod schedule;
pub mod transition;

pub use config::WaitConfig;
pub use probe::{probe_fn, FnProbe, Observation, StatusProbe};
pub use schedule::DelaySchedule;
pub use transition::{Classification, TransitionTable};

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WaitError<T> {
    #[error("entity reached failure state {status:?}")]
    TargetNotReached { status: String, snapshot: Option<T> },

    #[error("timeout after {elapsed:?} waiting for target state (last state: {})", fmt_status(.last_status))]
    Timeout {
        last_status: Option<String>,
        snapshot: Option<T>,
        elapsed: Duration,
    },

    #[error("wait cancelled (last state: {})", fmt_status(.last_status))]
    Cancelled { last_status: Option<String> },

    #[error("status probe failed: {0:#}")]
    Probe(#[source] anyhow::Error),

    #[error("unexpected state {status:?} observed {occurrences} consecutive times")]
    UnexpectedStatus { status: String, occurrences: u32 },

    #[error("entity not found after {occurrences} consecutive checks")]
    NotFound { occurrences: u32 },
}

fn fmt_status(status: &Option<String>) -> &str {
    match status.as_deref() {
        Some("") => "not found",
        Some(status) => status,
        None => "none",
    }
}

impl<T> WaitError<T> {
    /// Last status seen before the wait ended, if the error carries one.
    pub fn last_status(&self) -> Option<&str> {
        match self {
            WaitError::TargetNotReached { status, .. }
            | WaitError::UnexpectedStatus { status, .. } => Some(status),
            WaitError::Timeout { last_status, .. } | WaitError::Cancelled { last_status } => {
                last_status.as_deref()
            }
            WaitError::Probe(_) | WaitError::NotFound { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }
}

/// Consecutive-observation counters for one wait.
#[derive(Debug, Default)]
struct Counters {
    target: u32,
    unknown: u32,
    absent: u32,
}

impl Counters {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Polls `probe` for entity `id` until `table` says it converged.
///
/// Probes run strictly one after another. The only suspension points are
/// the probe itself and the sleep between probes; both are raced against
/// the deadline and `config.cancel`.
pub async fn wait<P>(
    config: &WaitConfig,
    probe: &P,
    id: &str,
    table: &TransitionTable,
) -> Result<Observation<P::Snapshot>, WaitError<P::Snapshot>>
where
    P: StatusProbe + ?Sized,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let cancel = &config.cancel;
    let mut schedule = config.schedule();
    let mut counters = Counters::default();
    let mut last: Option<Observation<P::Snapshot>> = None;
    let mut attempt: u32 = 0;

    if !table.has_target() {
        warn!(id = %id, "Transition table has no target; wait can only fail or time out");
    }

    if !config.initial_delay.is_zero() {
        let wake = (started + config.initial_delay).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WaitError::Cancelled { last_status: None }),
            _ = tokio::time::sleep_until(wake) => {}
        }
    }

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(&last));
        }
        if Instant::now() >= deadline {
            return Err(timed_out(last, started));
        }

        attempt += 1;
        let observation = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(&last)),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out(last, started)),
            result = probe.probe(id) => match result {
                Ok(observation) => observation,
                Err(err) => {
                    warn!(id = %id, attempt, error = %err, "Status probe failed");
                    return Err(WaitError::Probe(err));
                }
            },
        };

        let class = table.classify(&observation);
        debug!(id = %id, attempt, status = %observation.status, ?class, "Observed entity status");

        match class {
            Classification::Failure => {
                warn!(id = %id, attempt, status = %observation.status, "Entity reached failure state");
                return Err(WaitError::TargetNotReached {
                    status: observation.status,
                    snapshot: observation.snapshot,
                });
            }
            Classification::Target => {
                let seen = counters.target + 1;
                counters.reset();
                counters.target = seen;
                if seen >= config.target_occurrences {
                    info!(
                        id = %id,
                        attempt,
                        status = %observation.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Entity converged"
                    );
                    return Ok(observation);
                }
            }
            Classification::Pending => counters.reset(),
            Classification::Absent => {
                let seen = counters.absent + 1;
                counters.reset();
                counters.absent = seen;
                if seen > config.not_found_tolerance {
                    warn!(id = %id, occurrences = seen, "Entity still not found");
                    return Err(WaitError::NotFound { occurrences: seen });
                }
            }
            Classification::Unknown => {
                let seen = counters.unknown + 1;
                counters.reset();
                counters.unknown = seen;
                if seen > config.unknown_status_tolerance {
                    warn!(id = %id, status = %observation.status, occurrences = seen, "Unexpected entity status");
                    return Err(WaitError::UnexpectedStatus {
                        status: observation.status,
                        occurrences: seen,
                    });
                }
            }
        }

        last = Some(observation);

        let wake = (Instant::now() + schedule.next_delay()).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(&last)),
            _ = tokio::time::sleep_until(wake) => {}
        }
    }
}

fn cancelled<T>(last: &Option<Observation<T>>) -> WaitError<T> {
    let last_status = last.as_ref().map(|o| o.status.clone());
    info!(last_status = ?last_status, "Wait cancelled");
    WaitError::Cancelled { last_status }
}

fn timed_out<T>(last: Option<Observation<T>>, started: Instant) -> WaitError<T> {
    let elapsed = started.elapsed();
    let (last_status, snapshot) = match last {
        Some(o) => (Some(o.status), o.snapshot),
        None => (None, None),
    };
    warn!(last_status = ?last_status, elapsed_ms = elapsed.as_millis() as u64, "Wait timed out");
    WaitError::Timeout {
        last_status,
        snapshot,
        elapsed,
    }
}

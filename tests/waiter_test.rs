use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use converge::retry::{RetryPolicy, RetryingProbe};
use converge::waiter::{wait, Observation, StatusProbe, TransitionTable, WaitConfig, WaitError};

#[derive(Clone, Copy, Debug)]
enum Step {
    Status(&'static str),
    Absent,
    Fault(&'static str),
}

/// Replays a fixed sequence of observations; the last step repeats.
struct ScriptedProbe {
    steps: Mutex<Vec<Step>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    fn new(steps: &[Step]) -> Self {
        Self {
            steps: Mutex::new(steps.to_vec()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn statuses(statuses: &[&'static str]) -> Self {
        let steps: Vec<Step> = statuses.iter().map(|s| Step::Status(s)).collect();
        Self::new(&steps)
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    type Snapshot = String;

    async fn probe(&self, id: &str) -> Result<Observation<String>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            calls.len()
        };
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 { steps.remove(0) } else { steps[0] }
        };
        match step {
            Step::Status(status) => Ok(Observation::new(format!("{}#{}", id, call), status)),
            Step::Absent => Ok(Observation::absent()),
            Step::Fault(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

fn available_table() -> TransitionTable {
    TransitionTable::new()
        .pending(["PENDING"])
        .target(["AVAILABLE"])
        .failure(["FAILED"])
}

fn fast_config(timeout: Duration) -> WaitConfig {
    WaitConfig::new(timeout).with_poll_interval(Duration::from_millis(100))
}

#[tokio::test(start_paused = true)]
async fn test_converges_on_third_probe() {
    let probe = ScriptedProbe::statuses(&["PENDING", "PENDING", "AVAILABLE"]);

    let done = wait(&fast_config(Duration::from_secs(10)), &probe, "db-1", &available_table())
        .await
        .unwrap();

    assert_eq!(done.status, "AVAILABLE");
    assert_eq!(done.snapshot.as_deref(), Some("db-1#3"));
    assert_eq!(probe.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_while_pending() {
    let probe = ScriptedProbe::statuses(&["PENDING"]);
    let started = Instant::now();

    let err = wait(&fast_config(Duration::from_millis(300)), &probe, "db-1", &available_table())
        .await
        .unwrap_err();

    let elapsed = started.elapsed();
    assert!(err.is_timeout());
    assert_eq!(err.last_status(), Some("PENDING"));
    assert!(elapsed >= Duration::from_millis(300), "timed out early: {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(400), "timed out late: {:?}", elapsed);
    match err {
        WaitError::Timeout { snapshot, .. } => assert!(snapshot.is_some()),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_status_stops_the_wait() {
    let probe = ScriptedProbe::statuses(&["PENDING", "FAILED"]);

    let err = wait(&fast_config(Duration::from_secs(10)), &probe, "db-1", &available_table())
        .await
        .unwrap_err();

    assert!(matches!(err, WaitError::TargetNotReached { ref status, .. } if status == "FAILED"));
    assert!(err.to_string().contains("FAILED"));
    assert_eq!(probe.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_absence_then_fault_is_probe_error() {
    let probe = ScriptedProbe::new(&[Step::Absent, Step::Fault("AccessDenied")]);

    let err = wait(&fast_config(Duration::from_secs(10)), &probe, "db-1", &available_table())
        .await
        .unwrap_err();

    match err {
        WaitError::Probe(source) => assert_eq!(source.to_string(), "AccessDenied"),
        other => panic!("expected probe error, got {:?}", other),
    }
    assert_eq!(probe.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failure_wins_over_target() {
    let table = TransitionTable::new().target(["DONE"]).failure(["DONE"]);
    let probe = ScriptedProbe::statuses(&["DONE"]);

    let err = wait(&fast_config(Duration::from_secs(10)), &probe, "x", &table)
        .await
        .unwrap_err();
    assert!(matches!(err, WaitError::TargetNotReached { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_never_times_out_before_deadline_with_slow_backoff() {
    // Delays of 1s, 2s, 4s... would overshoot a 5s deadline; the last sleep
    // is clamped so the timeout lands exactly on it.
    let config = WaitConfig::new(Duration::from_secs(5))
        .with_poll_interval(Duration::from_secs(1))
        .with_backoff(2.0, Duration::from_secs(60));
    let probe = ScriptedProbe::statuses(&["PENDING"]);
    let started = Instant::now();

    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    // Probes at 0s, 1s and 3s; the next one would have been at 7s.
    assert_eq!(probe.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_probe_intervals_follow_schedule() {
    let config = WaitConfig::new(Duration::from_secs(60))
        .with_initial_delay(Duration::from_secs(2))
        .with_poll_interval(Duration::from_secs(1))
        .with_backoff(2.0, Duration::from_secs(3));
    let probe = ScriptedProbe::statuses(&["PENDING", "PENDING", "PENDING", "PENDING", "AVAILABLE"]);
    let started = Instant::now();

    wait(&config, &probe, "x", &available_table()).await.unwrap();

    let offsets: Vec<Duration> = probe.call_times().iter().map(|t| *t - started).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(5),
            Duration::from_secs(8),
            Duration::from_secs(11),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_sleep() {
    let config = WaitConfig::new(Duration::from_secs(600)).with_poll_interval(Duration::from_secs(30));
    let cancel = config.cancel.clone();
    let probe = ScriptedProbe::statuses(&["PENDING"]);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(45)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(err.last_status(), Some("PENDING"));
    assert_eq!(started.elapsed(), Duration::from_secs(45));
    assert_eq!(probe.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let config = fast_config(Duration::from_secs(10));
    config.cancel.cancel();
    let probe = ScriptedProbe::statuses(&["AVAILABLE"]);

    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(probe.call_count(), 0);
}

struct HangingProbe;

#[async_trait]
impl StatusProbe for HangingProbe {
    type Snapshot = ();

    async fn probe(&self, _id: &str) -> Result<Observation<()>> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_probe_is_bounded_by_timeout() {
    let started = Instant::now();
    let err = wait(&fast_config(Duration::from_secs(3)), &HangingProbe, "x", &available_table())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.last_status(), None);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_in_flight_check() {
    let config = fast_config(Duration::from_secs(600));
    let cancel = config.cancel.clone();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = wait(&config, &HangingProbe, "x", &available_table()).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, WaitError::Cancelled { last_status: None }));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_initial_delay() {
    let config = fast_config(Duration::from_secs(600)).with_initial_delay(Duration::from_secs(60));
    let cancel = config.cancel.clone();
    let probe = ScriptedProbe::statuses(&["AVAILABLE"]);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, WaitError::Cancelled { last_status: None }));
    assert_eq!(started.elapsed(), Duration::from_secs(1));
    assert_eq!(probe.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deletion_succeeds_on_absence() {
    let table = TransitionTable::new().pending(["DELETING"]).absent_is_target();
    let probe = ScriptedProbe::new(&[Step::Status("DELETING"), Step::Status("DELETING"), Step::Absent]);

    let done = wait(&fast_config(Duration::from_secs(10)), &probe, "x", &table)
        .await
        .unwrap();

    assert!(done.is_absent());
    assert!(done.snapshot.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_creation_tolerates_absence_until_it_appears() {
    let probe = ScriptedProbe::new(&[Step::Absent, Step::Absent, Step::Status("PENDING"), Step::Status("AVAILABLE")]);

    let done = wait(&fast_config(Duration::from_secs(10)), &probe, "x", &available_table())
        .await
        .unwrap();
    assert_eq!(done.status, "AVAILABLE");
}

#[tokio::test(start_paused = true)]
async fn test_persistent_absence_is_not_found() {
    let config = fast_config(Duration::from_secs(60)).with_not_found_tolerance(3);
    let probe = ScriptedProbe::new(&[Step::Absent]);

    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();

    assert!(matches!(err, WaitError::NotFound { occurrences: 4 }));
    assert_eq!(probe.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_target_occurrences_require_consecutive_hits() {
    let config = fast_config(Duration::from_secs(10)).with_target_occurrences(2);
    let probe = ScriptedProbe::statuses(&["AVAILABLE", "PENDING", "AVAILABLE", "AVAILABLE"]);

    let done = wait(&config, &probe, "x", &available_table()).await.unwrap();

    assert_eq!(done.snapshot.as_deref(), Some("x#4"));
    assert_eq!(probe.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_tolerance() {
    let config = fast_config(Duration::from_secs(10)).with_unknown_status_tolerance(2);

    // Two unknowns, a pending reset, two more unknowns: still within bounds.
    let probe = ScriptedProbe::statuses(&["MODIFYING", "MODIFYING", "PENDING", "MODIFYING", "MODIFYING", "AVAILABLE"]);
    let done = wait(&config, &probe, "x", &available_table()).await.unwrap();
    assert_eq!(done.status, "AVAILABLE");

    let probe = ScriptedProbe::statuses(&["MODIFYING"]);
    let err = wait(&config, &probe, "x", &available_table()).await.unwrap_err();
    match err {
        WaitError::UnexpectedStatus { status, occurrences } => {
            assert_eq!(status, "MODIFYING");
            assert_eq!(occurrences, 3);
        }
        other => panic!("expected unexpected status, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_identical_scripts_give_identical_outcomes() {
    let script = ["PENDING", "PENDING", "FAILED"];
    let config = fast_config(Duration::from_secs(10));

    let first = wait(&config, &ScriptedProbe::statuses(&script), "x", &available_table())
        .await
        .unwrap_err();
    let second = wait(&config, &ScriptedProbe::statuses(&script), "x", &available_table())
        .await
        .unwrap_err();

    assert_eq!(first.to_string(), second.to_string());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_waits_are_independent() {
    let config = fast_config(Duration::from_secs(10));
    let table = available_table();
    let fast = ScriptedProbe::statuses(&["PENDING", "AVAILABLE"]);
    let failing = ScriptedProbe::statuses(&["PENDING", "PENDING", "FAILED"]);
    let slow = ScriptedProbe::statuses(&["PENDING", "PENDING", "PENDING", "PENDING", "AVAILABLE"]);

    let (a, b, c) = tokio::join!(
        wait(&config, &fast, "a", &table),
        wait(&config, &failing, "b", &table),
        wait(&config, &slow, "c", &table),
    );

    assert_eq!(a.unwrap().snapshot.as_deref(), Some("a#2"));
    assert!(matches!(b.unwrap_err(), WaitError::TargetNotReached { .. }));
    assert_eq!(c.unwrap().snapshot.as_deref(), Some("c#5"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_probe_faults_are_retried() {
    let probe = ScriptedProbe::new(&[
        Step::Status("PENDING"),
        Step::Fault("Throttling"),
        Step::Fault("Throttling"),
        Step::Status("AVAILABLE"),
    ]);
    let retrying = RetryingProbe::new(
        &probe,
        RetryPolicy::default().with_initial_delay(Duration::from_millis(10)),
        |e: &anyhow::Error| e.to_string() == "Throttling",
    );

    let done = wait(&fast_config(Duration::from_secs(10)), &retrying, "x", &available_table())
        .await
        .unwrap();

    assert_eq!(done.status, "AVAILABLE");
    assert_eq!(probe.call_count(), 4);
}

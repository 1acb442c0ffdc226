use rand::Rng;
use std::time::Duration;

/// Growing delay sequence shared by the waiter and the retry policy.
///
/// Starts at `initial`, multiplies by `factor` after every step and caps the
/// nominal delay at `max`. With `jitter > 0` each yielded delay is spread
/// uniformly over `nominal * (1 ± jitter)`, so a delay at the cap may land
/// above `max` by up to the jitter fraction.
#[derive(Debug, Clone)]
pub struct DelaySchedule {
    next: Duration,
    factor: f64,
    max: Duration,
    jitter: f64,
}

impl DelaySchedule {
    pub fn new(initial: Duration, factor: f64, max: Duration, jitter: f64) -> Self {
        Self {
            next: initial.min(max),
            factor: factor.max(1.0),
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, 1.0, interval, 0.0)
    }

    /// Nominal delay of the next step, before jitter.
    pub fn peek(&self) -> Duration {
        self.next
    }

    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.next;
        self.next = self.next.mul_f64(self.factor).min(self.max);
        self.apply_jitter(nominal)
    }

    fn apply_jitter(&self, nominal: Duration) -> Duration {
        if self.jitter == 0.0 || nominal.is_zero() {
            return nominal;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        nominal.mul_f64(1.0 + spread)
    }
}

impl Iterator for DelaySchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

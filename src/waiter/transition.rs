use std::collections::HashSet;

use super::probe::Observation;

/// How the waiter should treat one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Pending,
    Target,
    Failure,
    /// Entity not found while it is expected to exist.
    Absent,
    Unknown,
}

/// Status sets driving a single wait. Built by resource adapters, never
/// shared between invocations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    pending: HashSet<String>,
    target: HashSet<String>,
    failure: HashSet<String>,
    absent_is_target: bool,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(statuses.into_iter().map(Into::into));
        self
    }

    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.extend(statuses.into_iter().map(Into::into));
        self
    }

    pub fn failure<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Treat "not found" as reaching the target. Used when waiting for
    /// deletion.
    pub fn absent_is_target(mut self) -> Self {
        self.absent_is_target = true;
        self
    }

    pub fn has_target(&self) -> bool {
        !self.target.is_empty() || self.absent_is_target
    }

    pub fn expects_absence(&self) -> bool {
        self.absent_is_target
    }

    /// Failure wins over target, target over pending. Misconfigured tables
    /// that list a status twice fail rather than report spurious success.
    pub fn classify<T>(&self, observation: &Observation<T>) -> Classification {
        if observation.is_absent() {
            return if self.absent_is_target {
                Classification::Target
            } else {
                Classification::Absent
            };
        }

        let status = observation.status.as_str();
        if self.failure.contains(status) {
            Classification::Failure
        } else if self.target.contains(status) {
            Classification::Target
        } else if self.pending.contains(status) {
            Classification::Pending
        } else {
            Classification::Unknown
        }
    }
}

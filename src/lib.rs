//! Wait for remote resources to converge on a steady state.
//!
//! [`waiter`] holds the generic poll loop, [`retry`] the per-call retry
//! policy, and [`modules`] the resource adapters that pair a status probe
//! with the transition tables for each resource kind.

pub mod modules;
pub mod retry;
pub mod telemetry;
pub mod utils;
pub mod waiter;

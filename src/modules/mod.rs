//! Resource adapters: the provider-specific half of every wait.
//!
//! An adapter knows how to probe one kind of remote entity, which status
//! labels mean "still going", "done" and "failed" for each condition it
//! supports, and how to issue the mutations whose effects it waits on.

pub mod aws;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::retry::RetryPolicy;
use crate::waiter::{TransitionTable, WaitConfig};

#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Resource kind as used on the command line, e.g. `acm-certificate`.
    fn name(&self) -> &str;

    fn conditions(&self) -> Vec<&str>;

    fn transitions(&self, condition: &str) -> Result<TransitionTable>;

    /// Blocks until entity `id` satisfies `condition` and returns a JSON
    /// summary of the final observation.
    async fn wait(&self, id: &str, condition: &str, config: &WaitConfig) -> Result<JsonValue>;

    /// Deletes entity `id` and waits until it is gone.
    async fn delete(&self, id: &str, config: &WaitConfig, retry: &RetryPolicy) -> Result<JsonValue>;
}

pub fn unsupported_condition(adapter: &dyn ResourceAdapter, condition: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{} does not support condition '{}' (expected one of: {})",
        adapter.name(),
        condition,
        adapter.conditions().join(", ")
    )
}

pub fn find_adapter<'a>(
    adapters: &'a [Box<dyn ResourceAdapter>],
    kind: &str,
) -> Result<&'a dyn ResourceAdapter> {
    adapters
        .iter()
        .find(|a| a.name() == kind)
        .map(|a| &**a)
        .with_context(|| {
            let known: Vec<_> = adapters.iter().map(|a| a.name()).collect();
            format!("Unknown resource kind '{}' (expected one of: {})", kind, known.join(", "))
        })
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use crate::modules::aws::clients::{ChangeSummary, Route53Operations};
use crate::modules::aws::error::is_transient;
use crate::modules::{unsupported_condition, ResourceAdapter};
use crate::retry::{RetryPolicy, RetryingProbe};
use crate::waiter::{self, Observation, StatusProbe, TransitionTable, WaitConfig};

const STATUS_PENDING: &str = "PENDING";
const STATUS_INSYNC: &str = "INSYNC";

pub const CONDITION_INSYNC: &str = "insync";

pub struct ChangeStatusProbe<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ?Sized> ChangeStatusProbe<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C: Route53Operations + ?Sized> StatusProbe for ChangeStatusProbe<'a, C> {
    type Snapshot = ChangeSummary;

    async fn probe(&self, id: &str) -> Result<Observation<ChangeSummary>> {
        Ok(match self.client.get_change(id).await? {
            Some(change) => {
                let status = change.status.clone();
                Observation::new(change, status)
            }
            None => Observation::absent(),
        })
    }
}

/// Route 53 change batches: `ChangeResourceRecordSets` returns a change id
/// that goes from PENDING to INSYNC once every authoritative server has it.
pub struct Route53ChangeModule<C> {
    client: C,
    probe_retry: RetryPolicy,
}

impl<C: Route53Operations> Route53ChangeModule<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            probe_retry: RetryPolicy::default(),
        }
    }

    pub fn with_probe_retry(mut self, policy: RetryPolicy) -> Self {
        self.probe_retry = policy;
        self
    }
}

#[async_trait]
impl<C: Route53Operations> ResourceAdapter for Route53ChangeModule<C> {
    fn name(&self) -> &str {
        "route53-change"
    }

    fn conditions(&self) -> Vec<&str> {
        vec![CONDITION_INSYNC]
    }

    fn transitions(&self, condition: &str) -> Result<TransitionTable> {
        match condition {
            CONDITION_INSYNC => Ok(TransitionTable::new()
                .pending([STATUS_PENDING])
                .target([STATUS_INSYNC])),
            _ => Err(unsupported_condition(self, condition)),
        }
    }

    async fn wait(&self, id: &str, condition: &str, config: &WaitConfig) -> Result<JsonValue> {
        let table = self.transitions(condition)?;
        let probe = RetryingProbe::new(
            ChangeStatusProbe::new(&self.client),
            self.probe_retry.clone(),
            is_transient,
        );

        let done = waiter::wait(config, &probe, id, &table)
            .await
            .with_context(|| format!("Failed waiting for Route 53 change '{}' to be {}", id, condition))?;

        Ok(json!({
            "phase": condition,
            "status": done.status,
            "outputs": done.snapshot,
        }))
    }

    async fn delete(&self, id: &str, _config: &WaitConfig, _retry: &RetryPolicy) -> Result<JsonValue> {
        anyhow::bail!("Route 53 change '{}' cannot be deleted; changes expire on their own", id)
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::modules::aws::clients::{CloudFrontOperations, DistributionSummary};
use crate::modules::aws::error::{has_code, is_transient};
use crate::modules::{unsupported_condition, ResourceAdapter};
use crate::retry::{RetryPolicy, RetryingProbe};
use crate::waiter::{self, Observation, StatusProbe, TransitionTable, WaitConfig};

const STATUS_IN_PROGRESS: &str = "InProgress";
const STATUS_DEPLOYED: &str = "Deployed";

pub const CONDITION_DEPLOYED: &str = "deployed";
pub const CONDITION_DELETED: &str = "deleted";

pub struct DistributionStatusProbe<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ?Sized> DistributionStatusProbe<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C: CloudFrontOperations + ?Sized> StatusProbe for DistributionStatusProbe<'a, C> {
    type Snapshot = DistributionSummary;

    async fn probe(&self, id: &str) -> Result<Observation<DistributionSummary>> {
        Ok(match self.client.get_distribution(id).await? {
            Some(dist) => {
                let status = dist.status.clone();
                Observation::new(dist, status)
            }
            None => Observation::absent(),
        })
    }
}

pub struct CloudFrontDistributionModule<C> {
    client: C,
    probe_retry: RetryPolicy,
}

impl<C: CloudFrontOperations> CloudFrontDistributionModule<C> {
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

    async fn wait_for(
        &self,
        id: &str,
        condition: &str,
        config: &WaitConfig,
    ) -> Result<Observation<DistributionSummary>> {
        let table = self.transitions(condition)?;
        let probe = RetryingProbe::new(
            DistributionStatusProbe::new(&self.client),
            self.probe_retry.clone(),
            is_transient,
        );

        waiter::wait(config, &probe, id, &table).await.with_context(|| {
            format!("Failed waiting for CloudFront distribution '{}' to be {}", id, condition)
        })
    }
}

#[async_trait]
impl<C: CloudFrontOperations> ResourceAdapter for CloudFrontDistributionModule<C> {
    fn name(&self) -> &str {
        "cloudfront-distribution"
    }

    fn conditions(&self) -> Vec<&str> {
        vec![CONDITION_DEPLOYED, CONDITION_DELETED]
    }

    fn transitions(&self, condition: &str) -> Result<TransitionTable> {
        match condition {
            CONDITION_DEPLOYED => Ok(TransitionTable::new()
                .pending([STATUS_IN_PROGRESS])
                .target([STATUS_DEPLOYED])),
            CONDITION_DELETED => Ok(TransitionTable::new()
                .pending([STATUS_IN_PROGRESS, STATUS_DEPLOYED])
                .absent_is_target()),
            _ => Err(unsupported_condition(self, condition)),
        }
    }

    async fn wait(&self, id: &str, condition: &str, config: &WaitConfig) -> Result<JsonValue> {
        let done = self.wait_for(id, condition, config).await?;
        Ok(json!({
            "phase": condition,
            "status": done.status,
            "outputs": done.snapshot,
        }))
    }

    async fn delete(&self, id: &str, config: &WaitConfig, retry: &RetryPolicy) -> Result<JsonValue> {
        let existing = retry
            .retry("get CloudFront distribution", &is_transient, || {
                self.client.get_distribution(id)
            })
            .await?;
        let Some(dist) = existing else {
            info!("CloudFront distribution '{}' does not exist, skipping deletion", id);
            return Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }));
        };

        if dist.enabled {
            info!("Disabling CloudFront distribution '{}'", id);
            retry
                .retry("disable CloudFront distribution", &is_transient, || {
                    self.client.disable_distribution(id)
                })
                .await?;
        }

        info!("Waiting for distribution '{}' to be disabled (this may take several minutes)...", id);
        self.wait_for(id, CONDITION_DEPLOYED, config).await?;

        // A stale ETag or a disable that has not propagated yet clears up on
        // its own; delete_distribution re-reads the ETag on every attempt.
        let retryable = |e: &anyhow::Error| {
            is_transient(e)
                || has_code(e, "PreconditionFailed")
                || has_code(e, "DistributionNotDisabled")
        };

        info!("Deleting CloudFront distribution '{}'", id);
        retry
            .retry("delete CloudFront distribution", &retryable, || {
                self.client.delete_distribution(id)
            })
            .await?;

        self.wait_for(id, CONDITION_DELETED, config).await?;
        info!("Successfully destroyed CloudFront distribution: {}", id);
        Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }))
    }
}

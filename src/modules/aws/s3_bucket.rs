use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::modules::aws::clients::{BucketSummary, S3Operations};
use crate::modules::aws::error::{has_code, is_transient};
use crate::modules::{unsupported_condition, ResourceAdapter};
use crate::retry::{RetryPolicy, RetryingProbe};
use crate::waiter::{self, Observation, StatusProbe, TransitionTable, WaitConfig};

/// HeadBucket has no lifecycle status; an existing bucket is reported with
/// this synthetic label.
const STATUS_EXISTS: &str = "EXISTS";

pub const CONDITION_EXISTS: &str = "exists";
pub const CONDITION_DELETED: &str = "deleted";

pub struct BucketStatusProbe<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ?Sized> BucketStatusProbe<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C: S3Operations + ?Sized> StatusProbe for BucketStatusProbe<'a, C> {
    type Snapshot = BucketSummary;

    async fn probe(&self, bucket: &str) -> Result<Observation<BucketSummary>> {
        Ok(match self.client.head_bucket(bucket).await? {
            Some(summary) => Observation::new(summary, STATUS_EXISTS),
            None => Observation::absent(),
        })
    }
}

pub struct S3BucketModule<C> {
    client: C,
    probe_retry: RetryPolicy,
}

impl<C: S3Operations> S3BucketModule<C> {
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
        bucket: &str,
        condition: &str,
        config: &WaitConfig,
    ) -> Result<Observation<BucketSummary>> {
        let table = self.transitions(condition)?;
        let probe = RetryingProbe::new(
            BucketStatusProbe::new(&self.client),
            self.probe_retry.clone(),
            is_transient,
        );

        waiter::wait(config, &probe, bucket, &table)
            .await
            .with_context(|| format!("Failed waiting for S3 bucket '{}' to be {}", bucket, condition))
    }
}

#[async_trait]
impl<C: S3Operations> ResourceAdapter for S3BucketModule<C> {
    fn name(&self) -> &str {
        "s3-bucket"
    }

    fn conditions(&self) -> Vec<&str> {
        vec![CONDITION_EXISTS, CONDITION_DELETED]
    }

    fn transitions(&self, condition: &str) -> Result<TransitionTable> {
        match condition {
            // A freshly created bucket may answer 404 for a while; absence is
            // tolerated up to the not-found bound.
            CONDITION_EXISTS => Ok(TransitionTable::new().target([STATUS_EXISTS])),
            CONDITION_DELETED => Ok(TransitionTable::new()
                .pending([STATUS_EXISTS])
                .absent_is_target()),
            _ => Err(unsupported_condition(self, condition)),
        }
    }

    async fn wait(&self, bucket: &str, condition: &str, config: &WaitConfig) -> Result<JsonValue> {
        let done = self.wait_for(bucket, condition, config).await?;
        Ok(json!({
            "phase": condition,
            "status": done.status,
            "outputs": done.snapshot,
        }))
    }

    async fn delete(&self, bucket: &str, config: &WaitConfig, retry: &RetryPolicy) -> Result<JsonValue> {
        let existing = retry
            .retry("head S3 bucket", &is_transient, || self.client.head_bucket(bucket))
            .await?;
        if existing.is_none() {
            info!("Bucket '{}' does not exist, skipping deletion", bucket);
            return Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }));
        }

        // S3 rejects overlapping operations on one bucket with OperationAborted.
        let retryable = |e: &anyhow::Error| is_transient(e) || has_code(e, "OperationAborted");

        info!("Deleting bucket '{}'", bucket);
        retry
            .retry("delete S3 bucket", &retryable, || self.client.delete_bucket(bucket))
            .await?;

        self.wait_for(bucket, CONDITION_DELETED, config).await?;
        info!("Successfully destroyed S3 bucket: {}", bucket);
        Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }))
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::modules::aws::clients::{ACMOperations, CertificateSummary};
use crate::modules::aws::error::{has_code, is_transient};
use crate::modules::{unsupported_condition, ResourceAdapter};
use crate::retry::{RetryPolicy, RetryingProbe};
use crate::waiter::{self, Observation, StatusProbe, TransitionTable, WaitConfig};

const STATUS_PENDING_VALIDATION: &str = "PENDING_VALIDATION";
const STATUS_ISSUED: &str = "ISSUED";
const STATUS_INACTIVE: &str = "INACTIVE";
const STATUS_EXPIRED: &str = "EXPIRED";
const STATUS_VALIDATION_TIMED_OUT: &str = "VALIDATION_TIMED_OUT";
const STATUS_REVOKED: &str = "REVOKED";
const STATUS_FAILED: &str = "FAILED";

pub const CONDITION_ISSUED: &str = "issued";
pub const CONDITION_DELETED: &str = "deleted";

pub struct CertificateStatusProbe<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ?Sized> CertificateStatusProbe<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C: ACMOperations + ?Sized> StatusProbe for CertificateStatusProbe<'a, C> {
    type Snapshot = CertificateSummary;

    async fn probe(&self, arn: &str) -> Result<Observation<CertificateSummary>> {
        Ok(match self.client.describe_certificate(arn).await? {
            Some(cert) => {
                let status = cert.status.clone();
                Observation::new(cert, status)
            }
            None => Observation::absent(),
        })
    }
}

pub struct ACMCertificateModule<C> {
    client: C,
    probe_retry: RetryPolicy,
}

impl<C: ACMOperations> ACMCertificateModule<C> {
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
        arn: &str,
        condition: &str,
        config: &WaitConfig,
    ) -> Result<Observation<CertificateSummary>> {
        let table = self.transitions(condition)?;
        let probe = RetryingProbe::new(
            CertificateStatusProbe::new(&self.client),
            self.probe_retry.clone(),
            is_transient,
        );

        waiter::wait(config, &probe, arn, &table)
            .await
            .with_context(|| format!("Failed waiting for ACM certificate '{}' to be {}", arn, condition))
    }
}

#[async_trait]
impl<C: ACMOperations> ResourceAdapter for ACMCertificateModule<C> {
    fn name(&self) -> &str {
        "acm-certificate"
    }

    fn conditions(&self) -> Vec<&str> {
        vec![CONDITION_ISSUED, CONDITION_DELETED]
    }

    fn transitions(&self, condition: &str) -> Result<TransitionTable> {
        match condition {
            CONDITION_ISSUED => Ok(TransitionTable::new()
                .pending([STATUS_PENDING_VALIDATION])
                .target([STATUS_ISSUED])
                .failure([
                    STATUS_FAILED,
                    STATUS_VALIDATION_TIMED_OUT,
                    STATUS_REVOKED,
                    STATUS_EXPIRED,
                    STATUS_INACTIVE,
                ])),
            CONDITION_DELETED => Ok(TransitionTable::new()
                .pending([
                    STATUS_ISSUED,
                    STATUS_PENDING_VALIDATION,
                    STATUS_INACTIVE,
                    STATUS_EXPIRED,
                    STATUS_REVOKED,
                    STATUS_FAILED,
                    STATUS_VALIDATION_TIMED_OUT,
                ])
                .absent_is_target()),
            _ => Err(unsupported_condition(self, condition)),
        }
    }

    async fn wait(&self, arn: &str, condition: &str, config: &WaitConfig) -> Result<JsonValue> {
        let done = self.wait_for(arn, condition, config).await?;
        Ok(json!({
            "phase": condition,
            "status": done.status,
            "outputs": done.snapshot,
        }))
    }

    async fn delete(&self, arn: &str, config: &WaitConfig, retry: &RetryPolicy) -> Result<JsonValue> {
        let existing = retry
            .retry("describe ACM certificate", &is_transient, || {
                self.client.describe_certificate(arn)
            })
            .await?;
        if existing.is_none() {
            info!("ACM certificate '{}' does not exist, skipping deletion", arn);
            return Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }));
        }

        // Certificates stay "in use" for a while after the distribution
        // using them is gone.
        let in_use_or_transient =
            |e: &anyhow::Error| is_transient(e) || has_code(e, "ResourceInUseException");

        info!("Deleting ACM certificate '{}'", arn);
        retry
            .retry("delete ACM certificate", &in_use_or_transient, || {
                self.client.delete_certificate(arn)
            })
            .await?;

        self.wait_for(arn, CONDITION_DELETED, config).await?;
        info!("Successfully destroyed ACM certificate: {}", arn);
        Ok(json!({ "phase": CONDITION_DELETED, "outputs": null }))
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_acm::Client as AcmClient;

use super::traits::{ACMOperations, CertificateSummary};
use crate::modules::aws::error::ApiError;

pub struct ACMModule {
    client: AcmClient,
}

impl ACMModule {
    pub fn new(client: AcmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ACMOperations for ACMModule {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateSummary>> {
        let result = match self.client.describe_certificate().certificate_arn(arn).send().await {
            Ok(result) => result,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                return Ok(None)
            }
            Err(e) => {
                return Err(ApiError::from_sdk("DescribeCertificate", &e))
                    .with_context(|| format!("Failed to describe certificate: {}", arn))
            }
        };

        let cert = result.certificate().context("No certificate in response")?;
        let status = cert.status().context("Certificate has no status")?;

        Ok(Some(CertificateSummary {
            arn: cert.certificate_arn().unwrap_or(arn).to_string(),
            domain_name: cert.domain_name().map(String::from),
            status: status.as_str().to_string(),
            in_use_by: cert.in_use_by().to_vec(),
        }))
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        self.client
            .delete_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("DeleteCertificate", &e))
            .with_context(|| format!("Failed to delete ACM certificate: {}", arn))?;

        Ok(())
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudfront::types::DistributionConfig;
use aws_sdk_cloudfront::Client as CloudFrontClient;

use super::traits::{CloudFrontOperations, DistributionSummary};
use crate::modules::aws::error::ApiError;

/// UpdateDistribution replaces the whole config, so the disabled copy keeps
/// every field and flips only `enabled`.
fn disabled_config(config: &DistributionConfig) -> DistributionConfig {
    let mut disabled = config.clone();
    disabled.enabled = false;
    disabled
}

pub struct CloudFrontModule {
    client: CloudFrontClient,
}

impl CloudFrontModule {
    pub fn new(client: CloudFrontClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudFrontOperations for CloudFrontModule {
    async fn get_distribution(&self, id: &str) -> Result<Option<DistributionSummary>> {
        let result = match self.client.get_distribution().id(id).send().await {
            Ok(result) => result,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_distribution()) => {
                return Ok(None)
            }
            Err(e) => {
                return Err(ApiError::from_sdk("GetDistribution", &e))
                    .with_context(|| format!("Failed to get distribution: {}", id))
            }
        };

        let dist = result.distribution().context("No distribution in response")?;
        let enabled = dist
            .distribution_config()
            .map(|config| config.enabled())
            .unwrap_or(false);

        Ok(Some(DistributionSummary {
            id: dist.id().to_string(),
            domain_name: dist.domain_name().to_string(),
            status: dist.status().to_string(),
            enabled,
        }))
    }

    async fn disable_distribution(&self, id: &str) -> Result<()> {
        let get_result = self.client.get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("GetDistributionConfig", &e))
            .context("Failed to get distribution config")?;

        let etag = get_result.e_tag()
            .context("No ETag in response")?
            .to_string();

        let config = get_result.distribution_config()
            .context("No distribution config in response")?;

        if !config.enabled() {
            return Ok(());
        }

        let disabled = disabled_config(config);

        self.client.update_distribution()
            .id(id)
            .distribution_config(disabled)
            .if_match(etag)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("UpdateDistribution", &e))
            .context("Failed to disable distribution")?;

        Ok(())
    }

    async fn delete_distribution(&self, id: &str) -> Result<()> {
        let get_result = self.client.get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("GetDistribution", &e))
            .context("Failed to get distribution")?;

        let etag = get_result.e_tag()
            .context("No ETag in response")?
            .to_string();

        self.client.delete_distribution()
            .id(id)
            .if_match(etag)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("DeleteDistribution", &e))
            .context("Failed to delete distribution")?;

        Ok(())
    }
}

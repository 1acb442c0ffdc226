use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use super::traits::{BucketSummary, S3Operations};
use crate::modules::aws::error::ApiError;

pub struct S3Module {
    client: S3Client,
}

impl S3Module {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl S3Operations for S3Module {
    async fn head_bucket(&self, bucket: &str) -> Result<Option<BucketSummary>> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(Some(BucketSummary {
                name: bucket.to_string(),
            })),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    debug!("Bucket {} does not exist", bucket);
                    return Ok(None);
                }

                let status = e.raw_response().map(|r| r.status().as_u16());
                match status {
                    Some(404) => Ok(None),
                    Some(301) => {
                        debug!("Bucket {} exists (got 301 redirect, likely in different region)", bucket);
                        Ok(Some(BucketSummary {
                            name: bucket.to_string(),
                        }))
                    }
                    _ => Err(ApiError::from_sdk("HeadBucket", &e))
                        .with_context(|| format!("Failed to check bucket existence: {}", bucket)),
                }
            }
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| ApiError::from_sdk("DeleteBucket", &e))
            .with_context(|| format!("Failed to delete bucket: {}", bucket))?;

        Ok(())
    }
}

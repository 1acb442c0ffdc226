use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: Option<String>,
    pub status: String,
    pub in_use_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub id: String,
    pub domain_name: String,
    pub status: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub id: String,
    pub status: String,
    pub submitted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
}

/// Every `get`/`describe` call returns `Ok(None)` when the entity does not
/// exist; `Err` is reserved for real faults.
#[async_trait]
pub trait ACMOperations: Send + Sync {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateSummary>>;
    async fn delete_certificate(&self, arn: &str) -> Result<()>;
}

#[async_trait]
pub trait CloudFrontOperations: Send + Sync {
    async fn get_distribution(&self, id: &str) -> Result<Option<DistributionSummary>>;
    async fn disable_distribution(&self, id: &str) -> Result<()>;
    async fn delete_distribution(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait Route53Operations: Send + Sync {
    async fn get_change(&self, id: &str) -> Result<Option<ChangeSummary>>;
}

#[async_trait]
pub trait S3Operations: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> Result<Option<BucketSummary>>;
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}

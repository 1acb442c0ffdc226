pub mod clients;
pub mod error;
pub mod utils;

pub mod acm_certificate;
pub mod cloudfront_distribution;
pub mod route53_change;
pub mod s3_bucket;

pub use acm_certificate::ACMCertificateModule;
pub use cloudfront_distribution::CloudFrontDistributionModule;
pub use route53_change::Route53ChangeModule;
pub use s3_bucket::S3BucketModule;

use crate::modules::ResourceAdapter;
use crate::retry::RetryPolicy;

/// Every AWS adapter, sharing one SDK configuration. Status probes retry
/// transient faults under `probe_retry`.
pub fn adapters(
    config: &aws_config::SdkConfig,
    probe_retry: &RetryPolicy,
) -> Vec<Box<dyn ResourceAdapter>> {
    vec![
        Box::new(
            ACMCertificateModule::new(utils::aws_acm_client(config))
                .with_probe_retry(probe_retry.clone()),
        ),
        Box::new(
            CloudFrontDistributionModule::new(utils::aws_cloudfront_client(config))
                .with_probe_retry(probe_retry.clone()),
        ),
        Box::new(
            Route53ChangeModule::new(utils::aws_route53_client(config))
                .with_probe_retry(probe_retry.clone()),
        ),
        Box::new(
            S3BucketModule::new(utils::aws_s3_client(config)).with_probe_retry(probe_retry.clone()),
        ),
    ]
}

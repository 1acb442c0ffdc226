use super::clients::{ACMModule, CloudFrontModule, Route53Module, S3Module};

/// Loads the default AWS configuration chain, optionally pinned to a region.
pub async fn get_aws_config(region_override: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region_override {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

pub fn aws_acm_client(config: &aws_config::SdkConfig) -> ACMModule {
    ACMModule::new(aws_sdk_acm::Client::new(config))
}

pub fn aws_cloudfront_client(config: &aws_config::SdkConfig) -> CloudFrontModule {
    CloudFrontModule::new(aws_sdk_cloudfront::Client::new(config))
}

pub fn aws_route53_client(config: &aws_config::SdkConfig) -> Route53Module {
    Route53Module::new(aws_sdk_route53::Client::new(config))
}

pub fn aws_s3_client(config: &aws_config::SdkConfig) -> S3Module {
    S3Module::new(aws_sdk_s3::Client::new(config))
}

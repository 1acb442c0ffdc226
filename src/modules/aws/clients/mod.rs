pub mod acm;
pub mod cloudfront;
pub mod route53;
pub mod s3;
pub mod traits;

pub use acm::ACMModule;
pub use cloudfront::CloudFrontModule;
pub use route53::Route53Module;
pub use s3::S3Module;
pub use traits::*;

use crate::config::Config;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use tracing;

// Creates the base AWS SDK configuration based on application config.
// Uses the default credential provider chain (env vars, profiles, etc.).
pub async fn create_sdk_config(config: &Config) -> SdkConfig {
    tracing::info!(sdk_region = %config.aws_region, "Setting SDK region");
    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.aws_region.clone()));

    if let Some(endpoint_url) = &config.localstack_endpoint {
        tracing::info!("Using localstack endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

pub fn create_dynamodb_client(sdk_config: &SdkConfig) -> DynamoDbClient {
    DynamoDbClient::new(sdk_config)
}

// Path-style addressing keeps LocalStack bucket URLs working.
pub fn create_s3_client(sdk_config: &SdkConfig) -> S3Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(true)
        .build();
    S3Client::from_conf(s3_config)
}

use crate::config::AwsSettings;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_smithy_types::timeout::TimeoutConfig;
use std::time::Duration;
use tracing;

// Creates the base AWS SDK configuration from the application settings.
// Credentials come from the loaded config rather than the default provider chain,
// so the job uses exactly the key pair it was started with.
pub async fn create_sdk_config(settings: &AwsSettings, timeout: Duration) -> SdkConfig {
    let region = Region::new(settings.region.clone());
    tracing::info!(sdk_region = %settings.region, "Setting SDK region");

    let credentials = Credentials::new(
        settings.access_key_id.clone(),
        settings.secret_access_key.clone(),
        None,
        None,
        "environment",
    );

    let timeouts = TimeoutConfig::builder()
        .operation_timeout(timeout)
        .build();

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .credentials_provider(credentials)
        .timeout_config(timeouts);

    if let Some(endpoint_url) = &settings.endpoint_url {
        tracing::info!("Using endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);
    } else {
        tracing::info!("Using default AWS endpoints.");
    }

    config_loader.load().await
}

// Creates an S3 client from a shared SdkConfig.
// Path-style addressing is only needed when talking to an endpoint override.
pub fn create_s3_client(sdk_config: &SdkConfig, path_style: bool) -> S3Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(path_style)
        .build();
    S3Client::from_conf(s3_config)
}

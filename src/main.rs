use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aws_clients;
mod config;
mod domain;
mod errors;
mod imaging;
mod keys;
mod models;
mod oauth;
mod pipeline;
mod scheduler;
mod stability;
mod storage;
mod twitter;

use crate::aws_clients::{create_s3_client, create_sdk_config};
use crate::config::Config;
use crate::errors::AppError;
use crate::keys::{ObjectKeyGenerator, SystemClock};
use crate::oauth::OAuth1Signer;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;
use crate::stability::StabilityClient;
use crate::storage::S3FileStorage;
use crate::twitter::TwitterClient;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "trend_image_bot=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Config::load()?;
    tracing::info!(bucket = %config.bucket_name, interval_secs = config.schedule_interval.as_secs(), "Configuration loaded");

    // --- Clients ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build HTTP client: {}", e)))?;

    tracing::info!("Initializing AWS S3 client...");
    let sdk_config = create_sdk_config(&config.aws, config.http_timeout).await;
    let s3_client = create_s3_client(&sdk_config, config.aws.endpoint_url.is_some());

    let twitter = Arc::new(TwitterClient::new(
        http.clone(),
        OAuth1Signer::new(config.twitter.clone()),
    ));
    let pipeline = Pipeline::new(
        twitter.clone(),
        Arc::new(StabilityClient::new(http, config.stability.clone())),
        Arc::new(S3FileStorage::new(s3_client, config.bucket_name.clone())),
        twitter,
        ObjectKeyGenerator::new(SystemClock),
    );

    // --- Scheduler ---
    let handle = Scheduler::new(config.schedule_interval, config.run_on_start).start(Arc::new(pipeline));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::InitError(format!("Failed to listen for shutdown signal: {}", e)))?;
    tracing::info!("Shutdown signal received, waiting for the current cycle to finish");
    handle.stop().await;

    Ok(())
}

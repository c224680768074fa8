use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod aws_clients;
mod config;
mod domain;
mod errors;
mod fanout;
mod geocoder;
mod handlers;
mod models;
mod repositories;
mod routes;
mod service;
mod startup;
mod storage;
#[cfg(test)]
mod testing;

use crate::aws_clients::{create_dynamodb_client, create_s3_client, create_sdk_config};
use crate::config::Config;
use crate::errors::AppError;
use crate::geocoder::GoogleGeocoder;
use crate::repositories::{
    DynamoDbCampgroundRepository, DynamoDbCommentRepository, DynamoDbNotificationRepository,
    DynamoDbReviewRepository, DynamoDbUserRepository,
};
use crate::service::{CampgroundService, Collaborators};
use crate::storage::S3ImageHost;

/// AppState holds shared resources for the web server.
#[derive(Clone)]
pub struct AppState {
    pub campgrounds: CampgroundService,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "campground_service=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(bind_address = %config.bind_address, bucket = %config.image_bucket_name, "Configuration loaded");

    // --- AWS Client Initialization ---
    let sdk_config = create_sdk_config(&config).await;
    let db_client = create_dynamodb_client(&sdk_config);
    let s3_client = create_s3_client(&sdk_config);

    // NOTE: Creating resources here isn't ideal for production.
    // Use IaC (Terraform, CDK, etc.) or manual setup.
    startup::init_resources(
        &db_client,
        &s3_client,
        &config.tables,
        &config.image_bucket_name,
        &config.aws_region,
    )
    .await?;

    let geocoder = GoogleGeocoder::new(
        config.geocoder_endpoint.clone(),
        config.geocoder_api_key.clone(),
        config.external_call_timeout,
    )
    .map_err(|e| AppError::InitError(format!("Failed to create geocoder client: {}", e)))?;

    let tables = &config.tables;
    let collaborators = Collaborators {
        campgrounds: Arc::new(DynamoDbCampgroundRepository::new(db_client.clone(), tables.campgrounds.clone())),
        users: Arc::new(DynamoDbUserRepository::new(db_client.clone(), tables.users.clone())),
        notifications: Arc::new(DynamoDbNotificationRepository::new(
            db_client.clone(),
            tables.notifications.clone(),
        )),
        comments: Arc::new(DynamoDbCommentRepository::new(db_client.clone(), tables.comments.clone())),
        reviews: Arc::new(DynamoDbReviewRepository::new(db_client, tables.reviews.clone())),
        images: Arc::new(S3ImageHost::new(
            s3_client,
            config.image_bucket_name.clone(),
            config.image_public_base_url.clone(),
        )),
        geocoder: Arc::new(geocoder),
    };

    let state = Arc::new(AppState {
        campgrounds: CampgroundService::new(collaborators, config.external_call_timeout),
    });
    let app = routes::create_router(state, config.max_upload_bytes);

    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

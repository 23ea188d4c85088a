//! Stowage API Server
//!
//! Main entry point for the Stowage file storage service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stowage_api::{AppState, create_router};
use stowage_core::storage::{S3Client, S3Storage, StorageConfig};
use stowage_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let storage_config = StorageConfig::from_settings(&config.storage)
        .context("Invalid storage configuration")?;

    // Connect to the object store
    let client = S3Client::from_options(storage_config.bucket(), storage_config.transport()).await;
    info!(
        bucket = %storage_config.bucket(),
        storage_path = %storage_config.storage_path(),
        tenant_prefix = ?storage_config.tenant_prefix(),
        cdn_url = %storage_config.cdn_url(),
        multipart_threshold = storage_config.multipart_upload_threshold(),
        "Object storage configured"
    );

    // Create application state
    let state = AppState {
        storage: Arc::new(S3Storage::new(storage_config, Arc::new(client))),
    };

    // Create router
    let app = create_router(state, &config.server);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(serve_path = %config.server.serve_path, "Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

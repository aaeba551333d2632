//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;
pub mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use stowage_core::{Config, MemorySettings};
use stowage_explorer::Explorer;

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(AppState, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let state = build_state(config).await?;
    let router = routes::setup_routes(&state.config, state.clone())?;

    Ok((state, router))
}

/// Wire the explorer against the seeded metadata store and the policy drivers.
pub async fn build_state(config: Config) -> Result<AppState> {
    tokio::fs::create_dir_all(&config.archive_temp_path)
        .await
        .with_context(|| format!("Failed to create {}", config.archive_temp_path))?;

    let metadata = store::seed_store().await;
    let drivers = storage::setup_drivers(&config, &store::default_policies()).await?;
    let settings = Arc::new(MemorySettings::with_defaults());

    let config = Arc::new(config);
    let explorer = Explorer::new(config.clone(), metadata, settings, drivers);
    Ok(AppState::new(config, explorer))
}

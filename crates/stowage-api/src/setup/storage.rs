//! Storage driver setup

use std::sync::Arc;

use anyhow::{Context, Result};
use stowage_core::models::StoragePolicy;
use stowage_core::Config;
use stowage_storage::{create_driver, DriverRegistry};

/// Build one driver per storage policy.
pub async fn setup_drivers(
    config: &Config,
    policies: &[StoragePolicy],
) -> Result<Arc<DriverRegistry>> {
    let registry = DriverRegistry::new();
    for policy in policies {
        let driver = create_driver(policy, config)
            .await
            .with_context(|| format!("Failed to create driver for policy {}", policy.id))?;
        tracing::info!(
            policy_id = policy.id,
            backend = %policy.backend,
            "Storage driver ready"
        );
        registry.register(policy.id, driver);
    }
    Ok(Arc::new(registry))
}

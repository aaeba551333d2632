use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stowage_core::models::StoragePolicy;
use stowage_core::Config;

use crate::{Driver, LocalStorage, StorageBackend, StorageError, StorageResult};

/// Create a storage driver for a policy based on configuration
pub async fn create_driver(
    policy: &StoragePolicy,
    config: &Config,
) -> StorageResult<Arc<dyn Driver>> {
    match policy.backend {
        StorageBackend::Local => {
            let base_url = policy
                .base_url
                .clone()
                .unwrap_or_else(|| format!("{}/files", config.site_url));
            let storage = LocalStorage::new(&config.local_storage_path, base_url).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 | StorageBackend::Remote => Err(StorageError::ConfigError(format!(
            "{} storage backend is not available in this build (policy {})",
            policy.backend, policy.id
        ))),
    }
}

/// Drivers keyed by storage policy id.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<u64, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, policy_id: u64, driver: Arc<dyn Driver>) {
        let mut drivers = self.drivers.write().unwrap_or_else(|e| e.into_inner());
        drivers.insert(policy_id, driver);
    }

    /// Driver serving `policy`.
    pub fn get(&self, policy: &StoragePolicy) -> StorageResult<Arc<dyn Driver>> {
        let drivers = self.drivers.read().unwrap_or_else(|e| e.into_inner());
        drivers.get(&policy.id).cloned().ok_or_else(|| {
            StorageError::ConfigError(format!("no driver registered for policy {}", policy.id))
        })
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let drivers = self.drivers.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<_> = drivers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("DriverRegistry").field("policies", &ids).finish()
    }
}

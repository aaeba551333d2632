use serde::{Deserialize, Serialize};

use crate::storage_types::StorageBackend;

use super::file::extension_of;

/// Storage policy: which backend holds a file and the constraints on what it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    pub id: u64,
    pub name: String,
    pub backend: StorageBackend,
    /// Maximum size of a single file in bytes, `0` for unlimited.
    pub max_size: u64,
    /// Lower-case extensions without the dot; empty allows everything.
    pub allowed_extensions: Vec<String>,
    pub base_url: Option<String>,
}

impl StoragePolicy {
    /// Whether previews are served by proxying bytes instead of redirecting.
    pub fn is_directly_preview(&self) -> bool {
        self.backend.is_proxied()
    }

    pub fn allows_size(&self, size: u64) -> bool {
        self.max_size == 0 || size <= self.max_size
    }

    pub fn allows_name(&self, name: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        match extension_of(name) {
            Some(ext) => self.allowed_extensions.iter().any(|allowed| *allowed == ext),
            None => false,
        }
    }
}

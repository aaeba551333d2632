//! Metadata store bootstrap
//!
//! The service runs on the in-memory store, seeded with a local storage policy, the
//! guest group used for signed links, and one regular user.

use std::sync::Arc;

use stowage_core::models::{Group, GroupOptions, StoragePolicy, User, GUEST_GROUP_ID};
use stowage_core::{MemoryMetadataStore, StorageBackend};

pub const LOCAL_POLICY_ID: u64 = 1;
pub const USERS_GROUP_ID: u64 = 2;
pub const DEFAULT_USER_ID: u64 = 1;
const DEFAULT_CAPACITY: u64 = 1 << 30;

pub fn default_policies() -> Vec<StoragePolicy> {
    vec![StoragePolicy {
        id: LOCAL_POLICY_ID,
        name: "local".to_string(),
        backend: StorageBackend::Local,
        max_size: 0,
        allowed_extensions: Vec::new(),
        base_url: None,
    }]
}

pub async fn seed_store() -> Arc<MemoryMetadataStore> {
    let store = Arc::new(MemoryMetadataStore::new());
    for policy in default_policies() {
        store.add_policy(policy).await;
    }

    store
        .add_group(Group {
            id: GUEST_GROUP_ID,
            name: "guests".to_string(),
            max_storage: 0,
            policy_id: None,
            options: GroupOptions::default(),
        })
        .await;

    store
        .add_user(User {
            id: DEFAULT_USER_ID,
            nickname: "admin".to_string(),
            storage: 0,
            group: Group {
                id: USERS_GROUP_ID,
                name: "users".to_string(),
                max_storage: DEFAULT_CAPACITY,
                policy_id: Some(LOCAL_POLICY_ID),
                options: GroupOptions::default(),
            },
        })
        .await;

    tracing::debug!(user_id = DEFAULT_USER_ID, "Metadata store seeded");
    store
}

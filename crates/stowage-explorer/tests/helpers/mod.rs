#![allow(dead_code)]

pub mod fixtures;
pub mod hooks;

use std::sync::Arc;

use stowage_core::models::{FolderRecord, Group, GroupOptions, StoragePolicy, User, GUEST_GROUP_ID};
use stowage_core::{Config, MemoryMetadataStore, MemorySettings, MetadataStore, StorageBackend};
use stowage_explorer::Explorer;
use stowage_storage::{Driver, DriverRegistry, LocalStorage};
use tempfile::TempDir;

pub const SITE_URL: &str = "https://drive.example.com";
pub const LOCAL_POLICY_ID: u64 = 1;
pub const REMOTE_POLICY_ID: u64 = 2;
pub const USER_CAPACITY: u64 = 1 << 20;

/// Explorer wired to in-memory stores and a local driver under a temp directory.
pub struct TestExplorer {
    pub explorer: Explorer,
    pub store: Arc<MemoryMetadataStore>,
    pub settings: Arc<MemorySettings>,
    pub drivers: Arc<DriverRegistry>,
    pub local: Arc<LocalStorage>,
    pub user: User,
    pub root: FolderRecord,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestExplorer {
    pub async fn storage_used(&self) -> u64 {
        self.store
            .get_user(self.user.id)
            .await
            .expect("Failed to load user")
            .expect("User missing")
            .storage
    }

    /// Reload the user, picking up capacity changes.
    pub async fn current_user(&self) -> User {
        self.store
            .get_user(self.user.id)
            .await
            .expect("Failed to load user")
            .expect("User missing")
    }

    pub fn archive_dir(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.config.archive_temp_path)
    }
}

pub fn local_policy() -> StoragePolicy {
    StoragePolicy {
        id: LOCAL_POLICY_ID,
        name: "local".to_string(),
        backend: StorageBackend::Local,
        max_size: 0,
        allowed_extensions: Vec::new(),
        base_url: None,
    }
}

/// Policy backed by [`fixtures::PresignedDriver`], which always redirects.
pub fn remote_policy() -> StoragePolicy {
    StoragePolicy {
        id: REMOTE_POLICY_ID,
        name: "remote".to_string(),
        backend: StorageBackend::S3,
        max_size: 0,
        allowed_extensions: Vec::new(),
        base_url: Some("https://cdn.example.com".to_string()),
    }
}

pub async fn setup_test_explorer() -> TestExplorer {
    setup_test_explorer_with(GroupOptions::default(), 3600).await
}

/// Setup with custom group options and upload deadline
pub async fn setup_test_explorer_with(options: GroupOptions, upload_timeout_secs: u64) -> TestExplorer {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = Config {
        site_url: SITE_URL.to_string(),
        local_storage_path: temp_dir.path().join("uploads").to_string_lossy().into_owned(),
        archive_temp_path: temp_dir.path().join("archives").to_string_lossy().into_owned(),
        upload_timeout_secs,
        ..Config::default()
    };
    std::fs::create_dir_all(&config.archive_temp_path).expect("Failed to create archive dir");

    let local = Arc::new(
        LocalStorage::new(&config.local_storage_path, String::new())
            .await
            .expect("Failed to create local storage"),
    );
    let drivers = Arc::new(DriverRegistry::new());
    drivers.register(LOCAL_POLICY_ID, local.clone() as Arc<dyn Driver>);
    drivers.register(
        REMOTE_POLICY_ID,
        Arc::new(fixtures::PresignedDriver::new("https://cdn.example.com")),
    );

    let store = Arc::new(MemoryMetadataStore::new());
    store.add_policy(local_policy()).await;
    store.add_policy(remote_policy()).await;
    store
        .add_group(Group {
            id: GUEST_GROUP_ID,
            name: "guests".to_string(),
            max_storage: 0,
            policy_id: None,
            options: GroupOptions::default(),
        })
        .await;

    let user = User {
        id: 1,
        nickname: "alice".to_string(),
        storage: 0,
        group: Group {
            id: 2,
            name: "users".to_string(),
            max_storage: USER_CAPACITY,
            policy_id: Some(LOCAL_POLICY_ID),
            options,
        },
    };
    let root = store.add_user(user.clone()).await;

    let settings = Arc::new(MemorySettings::with_defaults());
    let explorer = Explorer::new(
        Arc::new(config.clone()),
        store.clone(),
        settings.clone(),
        drivers.clone(),
    );

    TestExplorer {
        explorer,
        store,
        settings,
        drivers,
        local,
        user,
        root,
        config,
        _temp_dir: temp_dir,
    }
}

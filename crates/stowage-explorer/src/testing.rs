//! Fixtures for the unit tests of this crate.

use std::sync::Arc;

use stowage_core::models::{
    FileRecord, FolderRecord, Group, GroupOptions, StoragePolicy, User, GUEST_GROUP_ID,
};
use stowage_core::{Config, MemoryMetadataStore, MemorySettings, MetadataStore, NewFile, StorageBackend};
use stowage_storage::{generate_save_key, Driver, DriverRegistry, LocalStorage};
use tempfile::TempDir;

use crate::explorer::Explorer;
use crate::filesystem::{FileSystem, UploadContext};

const CAPACITY: u64 = 1024;

pub(crate) struct TestEnv {
    _dir: TempDir,
    pub store: Arc<MemoryMetadataStore>,
    pub settings: Arc<MemorySettings>,
    pub explorer: Explorer,
    pub driver: Arc<LocalStorage>,
    pub policy: StoragePolicy,
    pub user: User,
    pub root: FolderRecord,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            site_url: "https://drive.example.com".to_string(),
            local_storage_path: dir.path().join("uploads").to_string_lossy().into_owned(),
            archive_temp_path: dir.path().join("archives").to_string_lossy().into_owned(),
            ..Config::default()
        };

        let policy = StoragePolicy {
            id: 1,
            name: "local".to_string(),
            backend: StorageBackend::Local,
            max_size: 0,
            allowed_extensions: Vec::new(),
            base_url: None,
        };
        let driver = Arc::new(
            LocalStorage::new(&config.local_storage_path, String::new())
                .await
                .unwrap(),
        );
        let drivers = Arc::new(DriverRegistry::new());
        drivers.register(policy.id, driver.clone());

        let store = Arc::new(MemoryMetadataStore::new());
        store.add_policy(policy.clone()).await;
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
                max_storage: CAPACITY,
                policy_id: Some(policy.id),
                options: GroupOptions::default(),
            },
        };
        let root = store.add_user(user.clone()).await;

        let settings = Arc::new(MemorySettings::with_defaults());
        let explorer = Explorer::new(Arc::new(config), store.clone(), settings.clone(), drivers);

        Self {
            _dir: dir,
            store,
            settings,
            explorer,
            driver,
            policy,
            user,
            root,
        }
    }

    pub async fn filesystem(&self) -> FileSystem {
        self.filesystem_for(self.user.clone()).await
    }

    pub async fn filesystem_for(&self, user: User) -> FileSystem {
        self.explorer.filesystem(user).await.unwrap()
    }

    /// A second user in the same group, without files.
    pub async fn other_user(&self) -> User {
        let user = User {
            id: 2,
            nickname: "bob".to_string(),
            ..self.user.clone()
        };
        self.store.add_user(user.clone()).await;
        user
    }

    pub fn upload_context(&self, name: &str, size: u64) -> UploadContext {
        UploadContext::new(
            "/",
            name,
            size,
            self.policy.clone(),
            generate_save_key(self.user.id, name),
        )
    }

    pub async fn put_file(&self, name: &str, bytes: &[u8]) -> FileRecord {
        self.put_file_in(&self.root, name, bytes).await
    }

    /// Store `bytes` and insert a record for them in `folder`.
    pub async fn put_file_in(&self, folder: &FolderRecord, name: &str, bytes: &[u8]) -> FileRecord {
        let key = generate_save_key(self.user.id, name);
        self.driver
            .put(&key, Box::pin(std::io::Cursor::new(bytes.to_vec())), bytes.len() as u64)
            .await
            .unwrap();
        self.store
            .insert_file(NewFile {
                name: name.to_string(),
                user_id: self.user.id,
                folder_id: folder.id,
                source_name: key,
                size: bytes.len() as u64,
                policy_id: self.policy.id,
            })
            .await
            .unwrap()
    }

    /// Another record named `name` sharing the physical object of `file`.
    pub async fn link_file(&self, file: &FileRecord, name: &str) -> FileRecord {
        self.store
            .insert_file(NewFile {
                name: name.to_string(),
                user_id: file.user_id,
                folder_id: file.folder_id,
                source_name: file.source_name.clone(),
                size: file.size,
                policy_id: file.policy_id,
            })
            .await
            .unwrap()
    }

    pub async fn storage_used(&self) -> u64 {
        self.store.get_user(self.user.id).await.unwrap().unwrap().storage
    }

    pub fn capacity(&self) -> u64 {
        CAPACITY
    }

    /// Account `bytes` against the user's capacity.
    pub async fn charge(&self, bytes: u64) {
        self.store
            .change_storage(self.user.id, bytes as i64)
            .await
            .unwrap();
    }
}

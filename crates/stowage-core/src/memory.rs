//! In-memory `MetadataStore`
//!
//! Backs the integration tests and the development server. Everything lives behind
//! one `RwLock`, so each trait call is atomic on its own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{FileRecord, FolderRecord, Group, StoragePolicy, User};
use crate::store::{MetadataStore, NewFile};

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<u64, User>,
    groups: BTreeMap<u64, Group>,
    policies: BTreeMap<u64, StoragePolicy>,
    folders: BTreeMap<u64, FolderRecord>,
    files: BTreeMap<u64, FileRecord>,
    next_folder_id: u64,
    next_file_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_group(&self, group: Group) {
        self.inner.write().await.groups.insert(group.id, group);
    }

    pub async fn add_policy(&self, policy: StoragePolicy) {
        self.inner.write().await.policies.insert(policy.id, policy);
    }

    /// Add a user together with its root folder.
    pub async fn add_user(&self, user: User) -> FolderRecord {
        let mut inner = self.inner.write().await;
        inner.groups.insert(user.group.id, user.group.clone());
        let owner = user.id;
        inner.users.insert(user.id, user);
        Self::push_folder(&mut inner, owner, None, "/", "/".to_string())
    }

    /// Create a folder under `parent`.
    pub async fn add_folder(&self, parent: &FolderRecord, name: &str) -> FolderRecord {
        let mut inner = self.inner.write().await;
        let path = parent.child_path(name);
        Self::push_folder(&mut inner, parent.owner_id, Some(parent.id), name, path)
    }

    /// Insert a file with an explicit id, as a fixture.
    pub async fn put_file(&self, file: FileRecord) {
        let mut inner = self.inner.write().await;
        inner.next_file_id = inner.next_file_id.max(file.id);
        inner.files.insert(file.id, file);
    }

    pub async fn file(&self, id: u64) -> Option<FileRecord> {
        self.inner.read().await.files.get(&id).cloned()
    }

    fn push_folder(
        inner: &mut Inner,
        owner_id: u64,
        parent_id: Option<u64>,
        name: &str,
        path: String,
    ) -> FolderRecord {
        inner.next_folder_id += 1;
        let now = Utc::now();
        let folder = FolderRecord {
            id: inner.next_folder_id,
            name: name.to_string(),
            parent_id,
            owner_id,
            path,
            created_at: now,
            updated_at: now,
        };
        inner.folders.insert(folder.id, folder.clone());
        folder
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn get_group(&self, group_id: u64) -> Result<Option<Group>, AppError> {
        Ok(self.inner.read().await.groups.get(&group_id).cloned())
    }

    async fn get_policy(&self, policy_id: u64) -> Result<Option<StoragePolicy>, AppError> {
        Ok(self.inner.read().await.policies.get(&policy_id).cloned())
    }

    async fn get_files_by_ids(
        &self,
        ids: &[u64],
        owner: Option<u64>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.files.get(id))
            .filter(|file| owner.map_or(true, |owner| file.user_id == owner))
            .cloned()
            .collect())
    }

    async fn remove_files_with_soft_links(
        &self,
        files: Vec<FileRecord>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(files
            .into_iter()
            .filter(|file| {
                !inner.files.values().any(|other| {
                    other.id != file.id
                        && other.policy_id == file.policy_id
                        && other.source_name == file.source_name
                })
            })
            .collect())
    }

    async fn get_folder_by_path(
        &self,
        owner: u64,
        path: &str,
    ) -> Result<Option<FolderRecord>, AppError> {
        let normalized = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        let inner = self.inner.read().await;
        Ok(inner
            .folders
            .values()
            .find(|folder| folder.owner_id == owner && folder.path == normalized)
            .cloned())
    }

    async fn get_child_file(
        &self,
        folder_id: u64,
        name: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .files
            .values()
            .find(|file| file.folder_id == folder_id && file.name == name)
            .cloned())
    }

    async fn insert_file(&self, file: NewFile) -> Result<FileRecord, AppError> {
        let mut inner = self.inner.write().await;
        if inner
            .files
            .values()
            .any(|existing| existing.folder_id == file.folder_id && existing.name == file.name)
        {
            return Err(AppError::ObjectExists(file.name));
        }
        inner.next_file_id += 1;
        let now = Utc::now();
        let record = FileRecord {
            id: inner.next_file_id,
            name: file.name,
            user_id: file.user_id,
            folder_id: file.folder_id,
            source_name: file.source_name,
            size: file.size,
            policy_id: file.policy_id,
            created_at: now,
            updated_at: now,
        };
        inner.files.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_file_size(&self, file_id: u64, size: u64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let file = inner
            .files
            .get_mut(&file_id)
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;
        file.size = size;
        file.updated_at = Utc::now();
        Ok(())
    }

    async fn update_source_name(&self, file_id: u64, source_name: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let file = inner
            .files
            .get_mut(&file_id)
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;
        file.source_name = source_name.to_string();
        Ok(())
    }

    async fn change_storage(&self, user_id: u64, delta: i64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        if delta >= 0 {
            let required = delta as u64;
            let available = user.remaining_capacity();
            if required > available {
                return Err(AppError::InsufficientCapacity {
                    available,
                    required,
                });
            }
            user.storage += required;
        } else {
            user.storage = user.storage.saturating_sub(delta.unsigned_abs());
        }
        Ok(())
    }
}

//! Metadata store interface
//!
//! The persistence layer for users, groups, policies, folders and file records is an
//! external collaborator. The explorer talks to it only through this trait; the
//! in-memory implementation in [`crate::memory`] backs tests and the development
//! server.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{FileRecord, FolderRecord, Group, StoragePolicy, User};

/// Fields of a file record that is about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub user_id: u64,
    pub folder_id: u64,
    pub source_name: String,
    pub size: u64,
    pub policy_id: u64,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError>;

    async fn get_group(&self, group_id: u64) -> Result<Option<Group>, AppError>;

    async fn get_policy(&self, policy_id: u64) -> Result<Option<StoragePolicy>, AppError>;

    /// Files with the given ids. `owner` restricts the result to one user; `None`
    /// is used by anonymous (signed) access.
    async fn get_files_by_ids(
        &self,
        ids: &[u64],
        owner: Option<u64>,
    ) -> Result<Vec<FileRecord>, AppError>;

    /// The subset of `files` whose physical object is not shared with any other
    /// record.
    async fn remove_files_with_soft_links(
        &self,
        files: Vec<FileRecord>,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn get_folder_by_path(
        &self,
        owner: u64,
        path: &str,
    ) -> Result<Option<FolderRecord>, AppError>;

    async fn get_child_file(
        &self,
        folder_id: u64,
        name: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    async fn insert_file(&self, file: NewFile) -> Result<FileRecord, AppError>;

    /// Set the size and bump the modification time.
    async fn update_file_size(&self, file_id: u64, size: u64) -> Result<(), AppError>;

    async fn update_source_name(&self, file_id: u64, source_name: &str) -> Result<(), AppError>;

    /// Adjust a user's accounted storage. Positive deltas fail with
    /// `InsufficientCapacity` when the group capacity would be exceeded.
    async fn change_storage(&self, user_id: u64, delta: i64) -> Result<(), AppError>;
}

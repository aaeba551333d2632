//! Per-request filesystem
//!
//! A `FileSystem` binds a user to the shared [`Explorer`] collaborators for one
//! request. It holds the request's hook pipeline, the resolved target files and an
//! optional root folder for path-relative lookups.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stowage_core::models::{FileRecord, FolderRecord, StoragePolicy, User};
use stowage_core::settings::{names, DEFAULT_MAX_EDIT_SIZE};
use stowage_core::{AppError, MetadataStore};
use stowage_storage::{generate_save_key, ByteReader, Driver, FileContent};
use tokio_util::sync::CancellationToken;

use crate::explorer::Explorer;
use crate::hooks::{Hook, HookPipeline, HookStage};

/// One file write handed to [`FileSystem::upload`].
pub struct UploadRequest {
    /// Virtual path of the destination folder.
    pub virtual_path: String,
    pub name: String,
    /// Size declared by the client.
    pub size: u64,
    pub mime_type: Option<String>,
    pub reader: ByteReader,
    /// Record whose content is replaced, for in-place updates. Its `source_name` is
    /// the key the content is written to.
    pub original: Option<FileRecord>,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("virtual_path", &self.virtual_path)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("original", &self.original.as_ref().map(|file| file.id))
            .finish_non_exhaustive()
    }
}

/// State shared by the hooks of one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub virtual_path: String,
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
    /// Physical key the content is written to.
    pub save_key: String,
    /// Policy the content is written with.
    pub policy: StoragePolicy,
    pub original: Option<FileRecord>,
    /// Destination folder, once resolved.
    pub folder: Option<FolderRecord>,
    /// Bytes of capacity reserved for this attempt and not yet returned.
    pub reserved_capacity: u64,
    /// Set once the driver has been asked to write; rollback hooks only touch
    /// storage after this.
    pub storage_touched: bool,
    pub bytes_written: u64,
    /// Record inserted for a new file.
    pub created: Option<FileRecord>,
}

impl UploadContext {
    pub fn new(
        virtual_path: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        policy: StoragePolicy,
        save_key: impl Into<String>,
    ) -> Self {
        Self {
            virtual_path: virtual_path.into(),
            name: name.into(),
            size,
            mime_type: None,
            save_key: save_key.into(),
            policy,
            original: None,
            folder: None,
            reserved_capacity: 0,
            storage_touched: false,
            bytes_written: 0,
            created: None,
        }
    }
}

/// Outcome of a preview request.
pub enum PreviewResponse {
    /// Send the client to `url`; it may cache the redirect for `max_age` seconds.
    Redirect { url: String, max_age: u64 },
    /// Serve the bytes through this service.
    Content {
        file: FileRecord,
        content: FileContent,
    },
}

impl std::fmt::Debug for PreviewResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreviewResponse::Redirect { url, max_age } => f
                .debug_struct("Redirect")
                .field("url", url)
                .field("max_age", max_age)
                .finish(),
            PreviewResponse::Content { file, content } => f
                .debug_struct("Content")
                .field("file_id", &file.id)
                .field("size", &content.size)
                .finish(),
        }
    }
}

pub struct FileSystem {
    explorer: Explorer,
    pub user: User,
    policy: Option<StoragePolicy>,
    /// Files the current operation acts on.
    pub targets: Vec<FileRecord>,
    /// Folder path-relative lookups start from.
    pub root: Option<FolderRecord>,
    hooks: HookPipeline,
}

impl FileSystem {
    /// Filesystem for `user`, writing with the storage policy of the user's group.
    pub async fn new(explorer: Explorer, user: User) -> Result<Self, AppError> {
        let policy = match user.group.policy_id {
            Some(policy_id) => Some(
                explorer
                    .store()
                    .get_policy(policy_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::PolicyNotAllowed(format!("storage policy {} not found", policy_id))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            explorer,
            user,
            policy,
            targets: Vec::new(),
            root: None,
            hooks: HookPipeline::new(),
        })
    }

    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        self.explorer.store()
    }

    /// Storage policy of the user's group.
    pub fn policy(&self) -> Option<&StoragePolicy> {
        self.policy.as_ref()
    }

    /// Register `hook` on `stage` for this filesystem's operations.
    pub fn use_hook(&mut self, stage: HookStage, hook: Arc<dyn Hook>) {
        self.hooks.register(stage, hook);
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    pub fn driver_for(&self, policy: &StoragePolicy) -> Result<Arc<dyn Driver>, AppError> {
        Ok(self.explorer.drivers().get(policy)?)
    }

    /// Storage policy holding `file`.
    pub async fn policy_of(&self, file: &FileRecord) -> Result<StoragePolicy, AppError> {
        self.store()
            .get_policy(file.policy_id)
            .await?
            .ok_or_else(|| {
                AppError::PolicyNotAllowed(format!(
                    "storage policy {} of file {} not found",
                    file.policy_id, file.id
                ))
            })
    }

    /// Fresh physical key for content named `name` owned by this user.
    pub fn generate_save_key(&self, name: &str) -> String {
        generate_save_key(self.user.id, name)
    }

    pub fn set_target_file(&mut self, files: Vec<FileRecord>) {
        self.targets = files;
    }

    /// Load the files with `ids` as targets. Only the user's own files resolve,
    /// except for the guest user which acts on signed links.
    pub async fn set_target_file_by_ids(&mut self, ids: &[u64]) -> Result<(), AppError> {
        let owner = if self.user.is_anonymous() {
            None
        } else {
            Some(self.user.id)
        };
        let files = self.store().get_files_by_ids(ids, owner).await?;
        if files.is_empty() {
            return Err(AppError::NotFound("file not found".to_string()));
        }
        self.targets = files;
        Ok(())
    }

    /// Resolve `path`, relative to the root folder, as the target unless a target is
    /// already set.
    pub async fn reset_file_if_not_exist(&mut self, path: &str) -> Result<(), AppError> {
        if !self.targets.is_empty() {
            return Ok(());
        }
        let root = self
            .root
            .clone()
            .ok_or_else(|| AppError::NotFound("root folder not set".to_string()))?;

        let trimmed = path.trim_matches('/');
        let (dir, name) = match trimmed.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", trimmed),
        };
        if name.is_empty() {
            return Err(AppError::NotFound(format!("file {} not found", path)));
        }

        let folder = if dir.is_empty() {
            root
        } else {
            let folder_path = root.child_path(dir);
            self.store()
                .get_folder_by_path(root.owner_id, &folder_path)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("folder {} not found", folder_path)))?
        };

        let file = self
            .store()
            .get_child_file(folder.id, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", path)))?;
        self.targets = vec![file];
        Ok(())
    }

    async fn reset_file_id_if_not_exist(&mut self, object_id: Option<u64>) -> Result<(), AppError> {
        if let Some(id) = object_id.filter(|id| *id != 0) {
            self.set_target_file_by_ids(&[id]).await?;
        }
        if self.targets.is_empty() {
            return Err(AppError::NotFound("file not found".to_string()));
        }
        Ok(())
    }

    pub fn first_target(&self) -> Result<&FileRecord, AppError> {
        self.targets
            .first()
            .ok_or_else(|| AppError::NotFound("file not found".to_string()))
    }

    /// Write `req` to storage, running the registered hooks around the transfer.
    ///
    /// The transfer is abandoned when `cancel` fires or the configured upload
    /// deadline passes; `AfterUploadCanceled` then rolls back.
    #[tracing::instrument(
        skip(self, req, cancel),
        fields(user_id = self.user.id, name = %req.name, size = req.size)
    )]
    pub async fn upload(
        &self,
        req: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadContext, AppError> {
        let policy = self.policy.clone().ok_or_else(|| {
            AppError::PolicyNotAllowed("user group has no storage policy".to_string())
        })?;
        let save_key = match &req.original {
            Some(original) => original.source_name.clone(),
            None => self.generate_save_key(&req.name),
        };

        let mut ctx = UploadContext::new(req.virtual_path, req.name, req.size, policy, save_key);
        ctx.mime_type = req.mime_type;
        ctx.original = req.original;

        let driver = match self.before_upload(&mut ctx).await {
            Ok(driver) => driver,
            Err(err) => {
                self.trigger_rollback(HookStage::AfterValidateFailed, &mut ctx)
                    .await;
                return Err(err);
            }
        };

        let start = std::time::Instant::now();
        ctx.storage_touched = true;
        if let Err(err) = self
            .transfer(driver.as_ref(), &mut ctx, req.reader, cancel)
            .await
        {
            tracing::warn!(
                storage_key = %ctx.save_key,
                error = %err,
                "Upload transfer failed, rolling back"
            );
            self.trigger_rollback(HookStage::AfterUploadCanceled, &mut ctx)
                .await;
            return Err(err);
        }

        if let Err(err) = self
            .hooks
            .trigger(HookStage::AfterUpload, self, &mut ctx)
            .await
        {
            self.trigger_rollback(HookStage::AfterValidateFailed, &mut ctx)
                .await;
            return Err(err);
        }

        tracing::info!(
            storage_key = %ctx.save_key,
            size_bytes = ctx.bytes_written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload completed"
        );
        Ok(ctx)
    }

    async fn before_upload(&self, ctx: &mut UploadContext) -> Result<Arc<dyn Driver>, AppError> {
        self.hooks
            .trigger(HookStage::BeforeUpload, self, ctx)
            .await?;
        self.driver_for(&ctx.policy)
    }

    async fn transfer(
        &self,
        driver: &dyn Driver,
        ctx: &mut UploadContext,
        reader: ByteReader,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let deadline = self.explorer.config().upload_timeout();
        let put = tokio::time::timeout(deadline, driver.put(&ctx.save_key, reader, ctx.size));

        let written = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AppError::UploadCanceled("client aborted the upload".to_string()));
            }
            result = put => match result {
                Err(_) => {
                    return Err(AppError::UploadCanceled(format!(
                        "upload exceeded {}s deadline",
                        deadline.as_secs()
                    )));
                }
                Ok(Err(err)) => return Err(AppError::Transfer(err.to_string())),
                Ok(Ok(written)) => written,
            },
        };

        ctx.bytes_written = written;
        if written != ctx.size {
            return Err(AppError::Transfer(format!(
                "expected {} bytes, received {}",
                ctx.size, written
            )));
        }
        Ok(())
    }

    /// Run a failure stage; its errors are logged, the caller reports the original one.
    async fn trigger_rollback(&self, stage: HookStage, ctx: &mut UploadContext) {
        if let Err(err) = self.hooks.trigger(stage, self, ctx).await {
            tracing::error!(
                stage = %stage,
                storage_key = %ctx.save_key,
                error = %err,
                "Rollback hooks failed"
            );
        }
    }

    /// Open the first target's content.
    pub async fn get_download_content(&self) -> Result<(FileRecord, FileContent), AppError> {
        let file = self.first_target()?.clone();
        let policy = self.policy_of(&file).await?;
        let driver = self.driver_for(&policy)?;
        let content = driver.get(&file.source_name).await?;
        Ok((file, content))
    }

    /// Open a file produced on this host, such as a prepared archive.
    pub async fn get_physical_file_content(&self, path: &str) -> Result<FileContent, AppError> {
        let path = Path::new(path);
        let file = tokio::fs::File::open(path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("{} not found", path.display()))
            } else {
                AppError::Io(format!("failed to open {}: {}", path.display(), err))
            }
        })?;
        let size = file.metadata().await?.len();
        Ok(FileContent {
            reader: Box::new(file),
            size,
        })
    }

    /// Time-limited URL for `file`. See [`crate::issuer::SignedAccessIssuer::sign_url`].
    pub async fn sign_url(
        &self,
        file: &FileRecord,
        ttl: Duration,
        is_download: bool,
    ) -> Result<String, AppError> {
        let policy = self.policy_of(file).await?;
        let driver = self.driver_for(&policy)?;
        self.explorer
            .issuer()
            .sign_url(&policy, driver.as_ref(), file, ttl, is_download)
            .await
    }

    /// Download URL for `object_id`, or for the current target when `None`, valid
    /// for the lifetime named by `timeout_setting`.
    pub async fn get_download_url(
        &mut self,
        object_id: Option<u64>,
        timeout_setting: &str,
    ) -> Result<String, AppError> {
        self.reset_file_id_if_not_exist(object_id).await?;
        let file = self.first_target()?.clone();
        let ttl = self.explorer.issuer().ttl(timeout_setting);
        self.sign_url(&file, ttl, true).await
    }

    /// Decide how a preview is delivered: text previews and proxied policies stream
    /// through this service, everything else redirects to a signed source URL.
    pub async fn preview(
        &mut self,
        object_id: Option<u64>,
        is_text: bool,
    ) -> Result<PreviewResponse, AppError> {
        self.reset_file_id_if_not_exist(object_id).await?;
        let file = self.first_target()?.clone();

        if is_text {
            let limit = self
                .explorer
                .settings()
                .get_int_setting(names::MAX_EDIT_SIZE, DEFAULT_MAX_EDIT_SIZE)
                .max(0) as u64;
            if file.size > limit {
                return Err(AppError::FileTooLarge {
                    size: file.size,
                    max: limit,
                });
            }
        }

        let policy = self.policy_of(&file).await?;
        if is_text || policy.is_directly_preview() {
            let driver = self.driver_for(&policy)?;
            let content = driver.get(&file.source_name).await?;
            return Ok(PreviewResponse::Content { file, content });
        }

        let ttl = self.explorer.issuer().ttl(names::PREVIEW_TIMEOUT);
        let url = self.sign_url(&file, ttl, false).await?;
        Ok(PreviewResponse::Redirect {
            url,
            max_age: ttl.as_secs(),
        })
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("user_id", &self.user.id)
            .field("policy", &self.policy.as_ref().map(|p| p.id))
            .field("targets", &self.targets.iter().map(|t| t.id).collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish()
    }
}

//! Hooks shared by the upload call sites.

use async_trait::async_trait;
use stowage_core::{AppError, NewFile};

use super::Hook;
use crate::filesystem::{FileSystem, UploadContext};

const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn original(ctx: &UploadContext) -> Result<&stowage_core::models::FileRecord, AppError> {
    ctx.original
        .as_ref()
        .ok_or_else(|| AppError::InvalidInput("no existing file to update".to_string()))
}

/// Rejects illegal names, oversized content and extensions the policy does not accept.
pub struct ValidateFile;

#[async_trait]
impl Hook for ValidateFile {
    fn name(&self) -> &'static str {
        "validate_file"
    }

    async fn run(&self, _fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let name = ctx.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(RESERVED_CHARS) {
            return Err(AppError::InvalidFileName(name.to_string()));
        }
        if !ctx.policy.allows_size(ctx.size) {
            return Err(AppError::FileTooLarge {
                size: ctx.size,
                max: ctx.policy.max_size,
            });
        }
        if !ctx.policy.allows_name(name) {
            return Err(AppError::ExtensionNotAllowed(name.to_string()));
        }
        Ok(())
    }
}

/// Resolves the destination folder; with overwrite disabled the name must be free.
pub struct ValidateDestination {
    pub disable_overwrite: bool,
}

#[async_trait]
impl Hook for ValidateDestination {
    fn name(&self) -> &'static str {
        "validate_destination"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let folder = fs
            .store()
            .get_folder_by_path(fs.user.id, &ctx.virtual_path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("folder {} not found", ctx.virtual_path)))?;

        if self.disable_overwrite
            && fs
                .store()
                .get_child_file(folder.id, &ctx.name)
                .await?
                .is_some()
        {
            return Err(AppError::ObjectExists(folder.child_path(&ctx.name)));
        }

        ctx.folder = Some(folder);
        Ok(())
    }
}

/// Points the attempt at the policy that holds the record being updated.
pub struct ResetPolicy;

#[async_trait]
impl Hook for ResetPolicy {
    fn name(&self) -> &'static str {
        "reset_policy"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let policy = fs.policy_of(original(ctx)?).await?;
        ctx.policy = policy;
        Ok(())
    }
}

/// Reserves the capacity the attempt grows the user's usage by.
pub struct ChangeCapacity;

#[async_trait]
impl Hook for ChangeCapacity {
    fn name(&self) -> &'static str {
        "change_capacity"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let old_size = ctx.original.as_ref().map_or(0, |file| file.size);
        let growth = ctx.size.saturating_sub(old_size);
        if growth == 0 {
            return Ok(());
        }
        let delta = i64::try_from(growth)
            .map_err(|_| AppError::InvalidInput(format!("size {} out of range", ctx.size)))?;
        fs.store().change_storage(fs.user.id, delta).await?;
        ctx.reserved_capacity += growth;
        Ok(())
    }
}

/// Returns whatever `ChangeCapacity` reserved. The reservation is taken out of the
/// context, so a second run releases nothing.
pub struct GiveBackCapacity;

#[async_trait]
impl Hook for GiveBackCapacity {
    fn name(&self) -> &'static str {
        "give_back_capacity"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let reserved = std::mem::take(&mut ctx.reserved_capacity);
        if reserved == 0 {
            return Ok(());
        }
        let delta = i64::try_from(reserved).unwrap_or(i64::MAX);
        if let Err(err) = fs.store().change_storage(fs.user.id, -delta).await {
            ctx.reserved_capacity = reserved;
            return Err(err);
        }
        tracing::debug!(user_id = fs.user.id, bytes = reserved, "Capacity given back");
        Ok(())
    }
}

/// Deletes whatever the attempt wrote at its save key.
pub struct CleanFileContent;

#[async_trait]
impl Hook for CleanFileContent {
    fn name(&self) -> &'static str {
        "clean_file_content"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        if !ctx.storage_touched {
            return Ok(());
        }
        let driver = fs.driver_for(&ctx.policy)?;
        driver.delete(std::slice::from_ref(&ctx.save_key)).await?;
        tracing::debug!(storage_key = %ctx.save_key, "Partial upload removed");
        Ok(())
    }
}

/// Zeroes the size of the record whose content was removed and releases its bytes.
pub struct ClearFileSize;

#[async_trait]
impl Hook for ClearFileSize {
    fn name(&self) -> &'static str {
        "clear_file_size"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let id = original(ctx)?.id;
        let current = fs
            .store()
            .get_files_by_ids(&[id], None)
            .await?
            .into_iter()
            .next();
        let Some(current) = current else {
            return Ok(());
        };
        if current.size == 0 {
            return Ok(());
        }

        fs.store().update_file_size(id, 0).await?;
        let released = i64::try_from(current.size).unwrap_or(i64::MAX);
        fs.store().change_storage(current.user_id, -released).await?;
        if let Some(original) = ctx.original.as_mut() {
            original.size = 0;
        }
        Ok(())
    }
}

/// Persists the save key of the attempt on the record being updated, once the
/// driver has been asked to write there.
pub struct UpdateSourceName;

#[async_trait]
impl Hook for UpdateSourceName {
    fn name(&self) -> &'static str {
        "update_source_name"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        if !ctx.storage_touched {
            return Ok(());
        }
        let id = original(ctx)?.id;
        fs.store().update_source_name(id, &ctx.save_key).await?;
        tracing::debug!(file_id = id, storage_key = %ctx.save_key, "Source name updated");
        Ok(())
    }
}

/// Inserts the record of a newly created file.
pub struct GenericAfterUpload;

#[async_trait]
impl Hook for GenericAfterUpload {
    fn name(&self) -> &'static str {
        "generic_after_upload"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let folder = match ctx.folder.clone() {
            Some(folder) => folder,
            None => fs
                .store()
                .get_folder_by_path(fs.user.id, &ctx.virtual_path)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("folder {} not found", ctx.virtual_path))
                })?,
        };

        let record = fs
            .store()
            .insert_file(NewFile {
                name: ctx.name.clone(),
                user_id: fs.user.id,
                folder_id: folder.id,
                source_name: ctx.save_key.clone(),
                size: ctx.size,
                policy_id: ctx.policy.id,
            })
            .await?;
        tracing::info!(file_id = record.id, storage_key = %record.source_name, "File created");

        // The record now owns the reservation.
        ctx.reserved_capacity = 0;
        ctx.folder = Some(folder);
        ctx.created = Some(record);
        Ok(())
    }
}

/// Commits the new size of the updated record and releases capacity it shrank by.
pub struct GenericAfterUpdate;

#[async_trait]
impl Hook for GenericAfterUpdate {
    fn name(&self) -> &'static str {
        "generic_after_update"
    }

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError> {
        let original = original(ctx)?.clone();
        fs.store().update_file_size(original.id, ctx.size).await?;

        let shrink = original.size.saturating_sub(ctx.size);
        if shrink > 0 {
            let delta = i64::try_from(shrink).unwrap_or(i64::MAX);
            fs.store().change_storage(original.user_id, -delta).await?;
        }

        ctx.reserved_capacity = 0;
        if let Some(record) = ctx.original.as_mut() {
            record.size = ctx.size;
        }
        tracing::info!(file_id = original.id, size_bytes = ctx.size, "File content updated");
        Ok(())
    }
}

//! Overwrite conflict resolution
//!
//! Cheap copies share one physical object between several records. Before the
//! content of such a record is replaced, the write is redirected to a fresh key so
//! the other records keep their bytes.

use std::sync::Arc;

use stowage_core::models::FileRecord;
use stowage_core::AppError;

use crate::filesystem::FileSystem;
use crate::hooks::{HookStage, UpdateSourceName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The key belongs to this record alone; content is replaced in place.
    InPlace,
    /// The key is shared; the record was moved to a fresh key.
    Redirected { previous_key: String },
}

/// Decide where the new content of `original` goes.
///
/// When the key is shared, `original.source_name` is rewritten to a fresh key and
/// `UpdateSourceName` is registered on every stage that can end the attempt, so the
/// record follows the new key once the driver has been asked to write there.
pub async fn resolve_overwrite(
    fs: &mut FileSystem,
    original: &mut FileRecord,
) -> Result<Resolution, AppError> {
    let exclusive = fs
        .store()
        .remove_files_with_soft_links(vec![original.clone()])
        .await?;
    if !exclusive.is_empty() {
        return Ok(Resolution::InPlace);
    }

    let fresh_key = fs.generate_save_key(&original.name);
    let previous_key = std::mem::replace(&mut original.source_name, fresh_key);
    for stage in [
        HookStage::AfterUpload,
        HookStage::AfterUploadCanceled,
        HookStage::AfterValidateFailed,
    ] {
        fs.use_hook(stage, Arc::new(UpdateSourceName));
    }

    tracing::info!(
        file_id = original.id,
        previous_key = %previous_key,
        storage_key = %original.source_name,
        "Shared storage key, redirecting write"
    );
    Ok(Resolution::Redirected { previous_key })
}

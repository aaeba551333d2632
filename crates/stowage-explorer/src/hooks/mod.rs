//! Upload hook pipeline
//!
//! Each upload attempt runs through four stages. Call sites assemble the hooks they
//! need on their own `FileSystem` before uploading; nothing is registered globally.
//!
//! - `BeforeUpload` runs before any byte is written. A failure there triggers
//!   `AfterValidateFailed` and no storage is touched.
//! - `AfterUpload` runs once the stream is fully persisted and commits metadata.
//! - `AfterUploadCanceled` runs when the client aborts, the deadline passes or the
//!   stream fails mid-transfer.
//! - `AfterValidateFailed` undoes what `BeforeUpload` hooks already applied.
//!
//! Rollback hooks must tolerate running twice.

mod builtin;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use stowage_core::AppError;

use crate::filesystem::{FileSystem, UploadContext};

pub use builtin::{
    ChangeCapacity, CleanFileContent, ClearFileSize, GenericAfterUpdate, GenericAfterUpload,
    GiveBackCapacity, ResetPolicy, UpdateSourceName, ValidateDestination, ValidateFile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    BeforeUpload,
    AfterUpload,
    AfterUploadCanceled,
    AfterValidateFailed,
}

impl HookStage {
    pub const ALL: [HookStage; 4] = [
        HookStage::BeforeUpload,
        HookStage::AfterUpload,
        HookStage::AfterUploadCanceled,
        HookStage::AfterValidateFailed,
    ];

    fn index(self) -> usize {
        match self {
            HookStage::BeforeUpload => 0,
            HookStage::AfterUpload => 1,
            HookStage::AfterUploadCanceled => 2,
            HookStage::AfterValidateFailed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookStage::BeforeUpload => "BeforeUpload",
            HookStage::AfterUpload => "AfterUpload",
            HookStage::AfterUploadCanceled => "AfterUploadCanceled",
            HookStage::AfterValidateFailed => "AfterValidateFailed",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A callback run at one stage of an upload attempt.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, fs: &FileSystem, ctx: &mut UploadContext) -> Result<(), AppError>;
}

/// Ordered hooks per stage for a single operation.
#[derive(Clone, Default)]
pub struct HookPipeline {
    stages: [Vec<Arc<dyn Hook>>; 4],
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook` to `stage`; hooks run in registration order.
    pub fn register(&mut self, stage: HookStage, hook: Arc<dyn Hook>) {
        self.stages[stage.index()].push(hook);
    }

    pub fn hooks(&self, stage: HookStage) -> &[Arc<dyn Hook>] {
        &self.stages[stage.index()]
    }

    /// Run every hook of `stage` in order, stopping at the first failure.
    pub async fn trigger(
        &self,
        stage: HookStage,
        fs: &FileSystem,
        ctx: &mut UploadContext,
    ) -> Result<(), AppError> {
        for hook in self.hooks(stage) {
            let start = std::time::Instant::now();
            if let Err(err) = hook.run(fs, ctx).await {
                tracing::debug!(
                    stage = %stage,
                    hook = hook.name(),
                    error = %err,
                    "Upload hook failed"
                );
                return Err(err);
            }
            tracing::trace!(
                stage = %stage,
                hook = hook.name(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload hook completed"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for stage in HookStage::ALL {
            let names: Vec<_> = self.hooks(stage).iter().map(|h| h.name()).collect();
            map.entry(&stage.as_str(), &names);
        }
        map.finish()
    }
}

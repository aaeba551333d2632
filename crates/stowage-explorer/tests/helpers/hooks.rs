use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use stowage_core::AppError;
use stowage_explorer::{FileSystem, Hook, UploadContext};

/// Counts its invocations; fails with `InvalidInput` when `fail` is set.
pub struct CountingHook {
    name: &'static str,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingHook {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Hook for CountingHook {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _fs: &FileSystem, _ctx: &mut UploadContext) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::InvalidInput(format!("{} rejected the upload", self.name)));
        }
        Ok(())
    }
}

//! Stowage Explorer
//!
//! Upload and download orchestration: the hook pipeline around uploads, overwrite
//! conflict resolution, the ephemeral session store, signed access links and
//! content delivery, plus the request-level services built on them.

pub mod conflict;
pub mod delivery;
pub mod explorer;
pub mod filesystem;
pub mod hooks;
pub mod issuer;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;

pub use conflict::{resolve_overwrite, Resolution};
pub use delivery::{serve_content, ServeOptions};
pub use explorer::Explorer;
pub use filesystem::{FileSystem, PreviewResponse, UploadContext, UploadRequest};
pub use hooks::{Hook, HookPipeline, HookStage};
pub use issuer::SignedAccessIssuer;
pub use service::{
    DownloadService, FileAnonymousGetService, FileIdService, OperationParams, PutContentRequest,
    Reply, SingleFileService,
};
pub use session::{SessionStore, SessionValue, ARCHIVE_PREFIX, DOWNLOAD_PREFIX};

//! Stowage Core Library
//!
//! Domain models, error types, configuration, URL signing and the collaborator
//! interfaces (metadata store, settings store) shared by every Stowage crate.

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod response;
pub mod settings;
pub mod signing;
pub mod storage_types;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use memory::MemoryMetadataStore;
pub use response::{codes, ServiceResponse};
pub use settings::{MemorySettings, SettingsStore};
pub use signing::UrlSigner;
pub use storage_types::StorageBackend;
pub use store::{MetadataStore, NewFile};

//! Stowage Storage Library
//!
//! Physical storage drivers. The explorer only sees the [`Driver`] trait; this crate
//! ships the local filesystem driver and the registry that maps storage policies to
//! driver instances.
//!
//! # Storage key format
//!
//! Keys are relative paths: `{user_id}/{yyyy}/{mm}/{random}_{file_name}`. Keys must
//! not contain `..` or a leading `/`. Key generation is centralized in the `keys`
//! module so every driver sees the same layout.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_driver, DriverRegistry};
pub use keys::generate_save_key;
pub use local::LocalStorage;
pub use stowage_core::StorageBackend;
pub use traits::{ByteReader, Driver, FileContent, SeekableReader, StorageError, StorageResult};

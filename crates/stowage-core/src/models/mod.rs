//! Domain models shared by the explorer, the storage drivers and the metadata store.

mod file;
mod folder;
mod policy;
mod user;

pub use file::FileRecord;
pub use folder::FolderRecord;
pub use policy::StoragePolicy;
pub use user::{Group, GroupOptions, User, GUEST_GROUP_ID};

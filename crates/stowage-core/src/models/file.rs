use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted metadata for a stored file.
///
/// `source_name` is the physical storage key. Several records may share the same
/// key (soft links); such records must be copied-on-write before their content
/// is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub name: String,
    pub user_id: u64,
    pub folder_id: u64,
    pub source_name: String,
    pub size: u64,
    pub policy_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Lower-cased extension of the display name, without the leading dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

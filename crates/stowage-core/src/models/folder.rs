use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory node in a user's virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
    pub owner_id: u64,
    /// Absolute virtual path, `/` for the root folder.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FolderRecord {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Virtual path of a child entry named `name`.
    pub fn child_path(&self, name: &str) -> String {
        if self.path.ends_with('/') {
            format!("{}{}", self.path, name)
        } else {
            format!("{}/{}", self.path, name)
        }
    }
}

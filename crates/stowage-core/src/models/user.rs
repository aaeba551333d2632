use serde::{Deserialize, Serialize};

/// Group id of the anonymous (guest) user.
pub const GUEST_GROUP_ID: u64 = 3;

/// Per-group behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
    /// Download sessions and archives may be fetched only once.
    pub one_time_download: bool,
    pub share_download: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    /// Storage capacity in bytes.
    pub max_storage: u64,
    /// Storage policy new files are written with; `None` means uploads are not allowed.
    pub policy_id: Option<u64>,
    pub options: GroupOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub nickname: String,
    /// Bytes currently accounted against the group capacity.
    pub storage: u64,
    pub group: Group,
}

impl User {
    /// The anonymous user used for signed, unauthenticated access.
    pub fn anonymous(group: Group) -> Self {
        Self {
            id: 0,
            nickname: "guest".to_string(),
            storage: 0,
            group,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == 0
    }

    pub fn remaining_capacity(&self) -> u64 {
        self.group.max_storage.saturating_sub(self.storage)
    }
}

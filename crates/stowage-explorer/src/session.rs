//! Ephemeral session store
//!
//! Process-wide key/value cache with per-entry TTL. Tokens handed out for prepared
//! archives and download sessions resolve through here; once an entry expires or is
//! deleted, lookups behave as if it never existed.
//!
//! One-time semantics live in the callers: they `get`, serve, then `deletes`. Two
//! lookups racing with the first successful read can both observe the value.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use stowage_core::models::FileRecord;
use stowage_core::Config;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Namespace of prepared archive paths.
pub const ARCHIVE_PREFIX: &str = "archive_";
/// Namespace of staged download targets.
pub const DOWNLOAD_PREFIX: &str = "download_";

/// Longest lifetime an entry can get; larger TTLs are capped.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValue {
    /// Filesystem path of a prepared archive.
    Archive(String),
    /// Snapshot of the file a download session serves.
    Download(FileRecord),
}

#[derive(Debug, Clone)]
struct SessionEntry {
    value: SessionValue,
    expires_at: Instant,
}

impl SessionEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Sharded session map to reduce lock contention
///
/// Keys are hashed to pick a shard. Expired entries are dropped on lookup and swept
/// from a shard each time an insert takes it to a multiple of `max_entries`. Live
/// entries are never evicted, so a shard holding only live entries keeps growing.
#[derive(Clone)]
pub struct SessionStore {
    shards: Vec<Arc<Mutex<HashMap<String, SessionEntry>>>>,
    max_entries: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_shards(16, 10_000)
    }

    /// Create a store with `shard_count` shards swept every `max_entries` entries.
    pub fn with_shards(shard_count: usize, max_entries: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_shards(
            config.session_shard_count,
            config.session_max_entries_per_shard,
        )
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, SessionEntry>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Store `value` under `key` until `ttl` elapses, replacing any previous entry.
    pub async fn put(&self, key: &str, value: SessionValue, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.shard(key).lock().await;

        let len = entries.len();
        if len >= self.max_entries && len % self.max_entries == 0 && !entries.contains_key(key) {
            entries.retain(|_, entry| entry.is_live(now));
            tracing::debug!(
                sessions_cleaned = len - entries.len(),
                sessions_live = entries.len(),
                "Swept expired sessions from shard"
            );
        }

        entries.insert(
            key.to_string(),
            SessionEntry {
                value,
                expires_at: now + ttl.min(MAX_TTL),
            },
        );
    }

    /// Value under `key`, or `None` when missing or expired.
    pub async fn get(&self, key: &str) -> Option<SessionValue> {
        let now = Instant::now();
        let mut entries = self.shard(key).lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Remove `prefix + key` for every key.
    pub async fn deletes(&self, keys: &[&str], prefix: &str) {
        for key in keys {
            let full_key = format!("{}{}", prefix, key);
            self.shard(&full_key).lock().await.remove(&full_key);
        }
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("shards", &self.shards.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

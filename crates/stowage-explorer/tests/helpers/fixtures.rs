use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use stowage_core::models::{FileRecord, FolderRecord, StoragePolicy};
use stowage_storage::{
    generate_save_key, ByteReader, Driver, FileContent, StorageBackend, StorageError,
    StorageResult,
};
use tokio::io::AsyncReadExt;

use super::{TestExplorer, LOCAL_POLICY_ID, REMOTE_POLICY_ID};

pub fn reader(bytes: &[u8]) -> ByteReader {
    Box::pin(std::io::Cursor::new(bytes.to_vec()))
}

/// In-memory driver whose objects are only reachable through presigned URLs.
pub struct PresignedDriver {
    base_url: String,
    fixed_url: Option<String>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl PresignedDriver {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            fixed_url: None,
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Driver that signs every object as `url`.
    pub fn fixed(url: &str) -> Self {
        Self {
            fixed_url: Some(url.to_string()),
            ..Self::new("")
        }
    }
}

#[async_trait]
impl Driver for PresignedDriver {
    async fn put(&self, key: &str, mut reader: ByteReader, _size: u64) -> StorageResult<u64> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let written = buf.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), buf);
        Ok(written)
    }

    async fn get(&self, key: &str) -> StorageResult<FileContent> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let size = bytes.len() as u64;
        Ok(FileContent {
            reader: Box::new(std::io::Cursor::new(bytes)),
            size,
        })
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
        file_name: &str,
        is_download: bool,
    ) -> StorageResult<String> {
        if let Some(url) = &self.fixed_url {
            return Ok(url.clone());
        }
        Ok(format!(
            "{}/{}?ttl={}&name={}&download={}",
            self.base_url,
            key,
            ttl.as_secs(),
            file_name,
            is_download
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Store `bytes` on the local policy and insert a record with an explicit id.
pub async fn store_file(app: &TestExplorer, id: u64, name: &str, bytes: &[u8]) -> FileRecord {
    store_file_in(app, &app.root, id, name, bytes).await
}

pub async fn store_file_in(
    app: &TestExplorer,
    folder: &FolderRecord,
    id: u64,
    name: &str,
    bytes: &[u8],
) -> FileRecord {
    let key = generate_save_key(app.user.id, name);
    app.local
        .put(&key, reader(bytes), bytes.len() as u64)
        .await
        .expect("Failed to store fixture object");
    let now = Utc::now();
    let file = FileRecord {
        id,
        name: name.to_string(),
        user_id: app.user.id,
        folder_id: folder.id,
        source_name: key,
        size: bytes.len() as u64,
        policy_id: LOCAL_POLICY_ID,
        created_at: now,
        updated_at: now,
    };
    app.store.put_file(file.clone()).await;
    file
}

/// Record `id` named `name` pointing at the physical object of `file`.
pub async fn link_file(app: &TestExplorer, file: &FileRecord, id: u64, name: &str) -> FileRecord {
    let link = FileRecord {
        id,
        name: name.to_string(),
        ..file.clone()
    };
    app.store.put_file(link.clone()).await;
    link
}

/// Record on the remote policy; the bytes live in the `PresignedDriver`.
pub async fn store_remote_file(app: &TestExplorer, id: u64, name: &str, bytes: &[u8]) -> FileRecord {
    let driver = app
        .drivers
        .get(&super::remote_policy())
        .expect("Remote driver not registered");
    let key = generate_save_key(app.user.id, name);
    driver
        .put(&key, reader(bytes), bytes.len() as u64)
        .await
        .expect("Failed to store remote object");
    let now = Utc::now();
    let file = FileRecord {
        id,
        name: name.to_string(),
        user_id: app.user.id,
        folder_id: app.root.id,
        source_name: key,
        size: bytes.len() as u64,
        policy_id: REMOTE_POLICY_ID,
        created_at: now,
        updated_at: now,
    };
    app.store.put_file(file.clone()).await;
    file
}

/// Read a whole object from the local policy.
pub async fn read_object(app: &TestExplorer, key: &str) -> Vec<u8> {
    let mut content = app.local.get(key).await.expect("Object missing");
    let mut buf = Vec::new();
    content
        .reader
        .read_to_end(&mut buf)
        .await
        .expect("Failed to read object");
    buf
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

/// Register policy `policy_id` whose driver signs every object as `url`, and a
/// record `file_id` on it.
pub async fn store_fixed_url_file(
    app: &TestExplorer,
    policy_id: u64,
    file_id: u64,
    name: &str,
    url: &str,
) -> FileRecord {
    app.store
        .add_policy(StoragePolicy {
            id: policy_id,
            name: format!("fixed-{}", policy_id),
            backend: StorageBackend::S3,
            max_size: 0,
            allowed_extensions: Vec::new(),
            base_url: None,
        })
        .await;
    app.drivers
        .register(policy_id, Arc::new(PresignedDriver::fixed(url)));

    let now = Utc::now();
    let file = FileRecord {
        id: file_id,
        name: name.to_string(),
        user_id: app.user.id,
        folder_id: app.root.id,
        source_name: format!("{}/fixed/{}", app.user.id, name),
        size: 0,
        policy_id,
        created_at: now,
        updated_at: now,
    };
    app.store.put_file(file.clone()).await;
    file
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ObjectStorage, StorageError, download_path, object_key, write_local};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Object storage held in memory, with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    fail_downloads: Arc<AtomicBool>,
    fail_uploads: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) {
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys_under(&self, folder: &str) -> Vec<String> {
        let prefix = format!("{folder}/");
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        folder: &str,
        path: &Path,
        extension: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image");
        let key = object_key(folder, file_name, extension);

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload {
                key,
                message: "upload disabled".to_string(),
            });
        }

        let data = tokio::fs::read(path).await?;
        self.put(&key, data, content_type).await;
        Ok(key)
    }

    async fn download(&self, key: &str, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(StorageError::Download {
                key: key.to_string(),
                message: "download disabled".to_string(),
            });
        }

        let object = self.get(key).await.ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;

        write_local(download_path(key, dest_dir), &object.data).await
    }
}

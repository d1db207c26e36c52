use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use tracing::info;

use super::{ObjectStorage, StorageError, download_path, object_key, write_local};

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(endpoint: &str, bucket: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Stores an in-memory upload under `folder`, returning its key.
    pub async fn put_bytes(
        &self,
        folder: &str,
        file_name: &str,
        extension: &str,
        content_type: &str,
        body: bytes::Bytes,
    ) -> Result<String, StorageError> {
        let key = object_key(folder, file_name, extension);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        info!("Uploaded {} to bucket {}", key, self.bucket);
        Ok(key)
    }

    pub async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presign_err = |message: String| StorageError::Presign {
            key: key.to_string(),
            message,
        };

        let config = PresigningConfig::expires_in(ttl).map_err(|e| presign_err(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| presign_err(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl ObjectStorage for StorageService {
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

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        info!("⬆️ Uploaded processed file {} to bucket {}", key, self.bucket);
        Ok(key)
    }

    async fn download(&self, key: &str, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Download {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        let local = write_local(download_path(key, dest_dir), &data).await?;

        info!("⬇️ Downloaded {} ({} bytes) to {}", key, data.len(), local.display());
        Ok(local)
    }
}

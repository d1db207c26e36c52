use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

pub mod memory;
pub mod s3;

pub const RAW_UPLOADS_FOLDER: &str = "raw_uploads";
pub const PROCESSED_FILES_FOLDER: &str = "processed-files";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to download '{key}': {message}")]
    Download { key: String, message: String },

    #[error("failed to upload '{key}': {message}")]
    Upload { key: String, message: String },

    #[error("object '{key}' not found")]
    NotFound { key: String },

    #[error("failed to presign '{key}': {message}")]
    Presign { key: String, message: String },

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage used by the job processor.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads a local file under `folder` and returns the new key.
    async fn upload(
        &self,
        folder: &str,
        path: &Path,
        extension: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Downloads `key` into `dest_dir` and returns the local path.
    async fn download(&self, key: &str, dest_dir: &Path) -> Result<PathBuf, StorageError>;
}

/// `<folder>/<uuid>-<stem>.<extension>`
pub fn object_key(folder: &str, file_name: &str, extension: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_stem)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    let extension = extension.trim_start_matches('.');
    format!("{}/{}-{}.{}", folder, Uuid::new_v4(), stem, extension)
}

fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Local file name for a downloaded key, unique per call.
pub(crate) fn download_path(key: &str, dest_dir: &Path) -> PathBuf {
    let name: String = Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    dest_dir.join(format!("raw-{}-{}", Uuid::new_v4(), name))
}

/// Writes downloaded bytes to `local`, removing any partial file on failure.
pub(crate) async fn write_local(local: PathBuf, data: &[u8]) -> Result<PathBuf, StorageError> {
    if let Err(e) = tokio::fs::write(&local, data).await {
        match tokio::fs::remove_file(&local).await {
            Ok(()) => {}
            Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
            Err(rm) => warn!("Failed to remove partial download {}: {}", local.display(), rm),
        }
        return Err(e.into());
    }
    Ok(local)
}

pub fn content_type_for(format: &str) -> String {
    mime_guess::from_ext(format).first_or_octet_stream().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_local_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let local = download_path("raw_uploads/a.png", &missing);

        let result = write_local(local.clone(), b"abc").await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!local.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_local_write_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let local = download_path("raw_uploads/a.png", dir.path());
        let written = write_local(local.clone(), b"abc").await.unwrap();
        assert_eq!(written, local);
        assert_eq!(std::fs::read(&local).unwrap(), b"abc");
    }

    #[test]
    fn test_object_key_layout() {
        let key = object_key(PROCESSED_FILES_FOLDER, "/tmp/job-out.jpg", "png");
        assert!(key.starts_with("processed-files/"));
        assert!(key.ends_with("-job-out.png"));
    }

    #[test]
    fn test_object_key_sanitizes_names() {
        let key = object_key(RAW_UPLOADS_FOLDER, "my photo (1).jpeg", ".jpeg");
        assert!(key.ends_with("-my_photo__1_.jpeg"));
        assert!(!key.contains(' '));
    }

    #[test]
    fn test_content_type_from_format() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("webp"), "image/webp");
        assert_eq!(content_type_for("nope"), "application/octet-stream");
    }

    #[test]
    fn test_download_paths_are_unique() {
        let dir = Path::new("/scratch");
        let a = download_path("raw_uploads/a.png", dir);
        let b = download_path("raw_uploads/a.png", dir);
        assert_ne!(a, b);
        assert!(a.starts_with(dir));
    }
}

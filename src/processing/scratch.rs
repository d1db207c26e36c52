use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// Local directory for downloads and tool outputs.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Fresh collision-free path, e.g. `probe-<uuid>.jpg`.
    pub fn path_for(&self, prefix: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}-{}.{}", prefix, Uuid::new_v4(), extension))
    }
}

/// Deletes `path`, logging instead of failing. A missing file is fine.
pub async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete temp file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paths_are_unique_and_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let a = scratch.path_for("attempt", "jpg");
        let b = scratch.path_for("attempt", "jpg");

        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
        assert_eq!(a.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_remove_quietly_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        remove_quietly(&path).await;

        tokio::fs::write(&path, b"x").await.unwrap();
        remove_quietly(&path).await;
        assert!(!path.exists());
    }
}

//! Local filesystem storage for uploaded build contexts and test images.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete artifact {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Stores files under one directory, each named `<uuid>-<original name>`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty file for `filename` and return its path with an
    /// open handle, for callers that stream content in. The directory is
    /// created on first use.
    pub async fn create(&self, filename: &str) -> Result<(PathBuf, File), ArtifactError> {
        let path = self
            .root
            .join(format!("{}-{}", uuid::Uuid::new_v4(), sanitize_filename(filename)));

        let open = async {
            tokio::fs::create_dir_all(&self.root).await?;
            File::create(&path).await
        };
        match open.await {
            Ok(file) => Ok((path, file)),
            Err(source) => Err(ArtifactError::Write { path, source }),
        }
    }

    /// Write `bytes` to a fresh file and return its path.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let (path, mut file) = self.create(filename).await?;

        let write = async {
            file.write_all(bytes).await?;
            file.flush().await
        };
        if let Err(source) = write.await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ArtifactError::Write { path, source });
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Artifact saved");
        Ok(path)
    }

    /// Size of a stored file, or `0` when it cannot be read.
    pub async fn size_of(&self, path: &Path) -> u64 {
        tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    /// Delete a stored file. A file that is already gone counts as deleted.
    pub async fn delete(&self, path: &Path) -> Result<(), ArtifactError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArtifactError::Delete {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Keep only the final path component and replace anything outside a
/// conservative alphabet with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\model.tar"), "model.tar");
    }

    #[test]
    fn sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_filename("my model (v2).tar"), "my_model__v2_.tar");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn save_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("uploads"));

        let path = store.save("ctx.tar", b"abc").await.expect("save");
        assert!(path.starts_with(store.root()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-ctx.tar"));
        assert_eq!(store.size_of(&path).await, 3);

        store.delete(&path).await.expect("delete");
        assert!(!path.exists());
        store.delete(&path).await.expect("second delete is a no-op");
    }

    #[tokio::test]
    async fn same_name_saves_to_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let a = store.save("x.jpg", b"1").await.unwrap();
        let b = store.save("x.jpg", b"2").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn size_of_missing_file_is_zero() {
        let store = LocalArtifactStore::new("/nonexistent");
        assert_eq!(store.size_of(Path::new("/nonexistent/a.tar")).await, 0);
    }
}

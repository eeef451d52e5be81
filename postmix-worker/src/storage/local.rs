//! Directory-backed object store
//!
//! Objects live at `{root}/{bucket}/{key}`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{ObjectStore, StorageError};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto the tree; keys may not climb out of the bucket
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe || bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(StorageError::InvalidKey(format!("{}/{}", bucket, key)));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::copy(&path, local_path).await {
            Ok(bytes) => {
                info!(key, path = %local_path.display(), bytes, "File downloaded");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound && !path.exists() => {
                Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &path).await?;
        info!(path = %local_path.display(), bucket, key, "File uploaded successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_through_directory() {
        let root = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());

        assert!(!store.exists("songs", "matchering/out.wav").await.unwrap());

        let src = work.path().join("out.wav");
        std::fs::write(&src, b"RIFF").unwrap();
        store.upload(&src, "songs", "matchering/out.wav").await.unwrap();
        assert!(store.exists("songs", "matchering/out.wav").await.unwrap());
        assert!(root.path().join("songs/matchering/out.wav").is_file());

        let dst = work.path().join("copy.wav");
        store.download("songs", "matchering/out.wav", &dst).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"RIFF");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        let err = store
            .download("songs", "nope.wav", &root.path().join("x.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_keys_cannot_escape_bucket() {
        let store = LocalObjectStore::new("/srv/objects");
        assert!(store.object_path("songs", "../secrets").is_err());
        assert!(store.object_path("songs", "/etc/passwd").is_err());
        assert!(store.object_path("..", "a.wav").is_err());
        assert!(store.object_path("songs", "").is_err());
        assert_eq!(
            store.object_path("songs", "static/audio/reference.wav").unwrap(),
            PathBuf::from("/srv/objects/songs/static/audio/reference.wav")
        );
    }
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::trace;

use super::{Storage, StorageError, StorageResult};

/// A file-based storage implementation. Keys map to paths under a base
/// directory, with `/` in keys becoming directory separators.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage instance, creating the base directory
    /// if it does not exist.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = base_path.into();
        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }
        Ok(Self { base_path: path })
    }

    /// The full filesystem path for a key
    fn key_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    /// Recursively collect keys under `dir`, prefixing them with `prefix`
    fn collect_keys<'a>(
        dir: &'a Path,
        prefix: &'a str,
        out: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = StorageResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };
                if entry.file_type().await?.is_dir() {
                    Self::collect_keys(&entry.path(), &key, out).await?;
                } else {
                    out.push(key);
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        trace!("Writing {} bytes to {}", data.len(), path.display());
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_path(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::KeyNotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.key_path(key).exists())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        if self.base_path.exists() {
            Self::collect_keys(&self.base_path, "", &mut keys).await?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn base_path(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();

        storage.put("governance/config", b"{}").await.unwrap();
        assert_eq!(storage.get("governance/config").await.unwrap(), b"{}");
        assert!(storage.exists("governance/config").await.unwrap());

        storage
            .put_json("governance/proposals/1", &42u64)
            .await
            .unwrap();
        let back: u64 = storage.get_json("governance/proposals/1").await.unwrap();
        assert_eq!(back, 42);

        let keys = storage.list("governance/proposals").await.unwrap();
        assert_eq!(keys, vec!["governance/proposals/1".to_string()]);

        storage.delete("governance/config").await.unwrap();
        assert!(!storage.exists("governance/config").await.unwrap());
        assert!(matches!(
            storage.get("governance/config").await,
            Err(StorageError::KeyNotFound(_))
        ));
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Storage, StorageError, StorageResult};

/// In-memory storage for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let mut store = self.data.write().await;
        store.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let store = self.data.read().await;
        store
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut store = self.data.write().await;
        store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let store = self.data.read().await;
        Ok(store.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let store = self.data.read().await;
        let mut keys: Vec<String> = store
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn base_path(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonStorage;

    #[tokio::test]
    async fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();

        storage.put("test1", b"hello").await.unwrap();
        assert_eq!(storage.get("test1").await.unwrap(), b"hello");

        storage.put("test1", b"updated").await.unwrap();
        assert_eq!(storage.get("test1").await.unwrap(), b"updated");

        storage.put("prefix/a", b"1").await.unwrap();
        storage.put("prefix/b", b"2").await.unwrap();
        storage.put("other/c", b"3").await.unwrap();
        let keys = storage.list("prefix/").await.unwrap();
        assert_eq!(keys, vec!["prefix/a".to_string(), "prefix/b".to_string()]);

        assert!(storage.exists("test1").await.unwrap());
        storage.delete("test1").await.unwrap();
        assert!(!storage.exists("test1").await.unwrap());
        assert!(matches!(
            storage.get("test1").await,
            Err(StorageError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_storage_json() {
        let storage = MemoryStorage::new();
        storage.put_json("doc", &vec![1u64, 2, 3]).await.unwrap();
        let back: Vec<u64> = storage.get_json("doc").await.unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}

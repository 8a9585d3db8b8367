//! In-memory storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::filesystem::{validate_key, Filesystem};

/// Storage backed by a map; content is lost on drop.
#[derive(Default)]
pub struct MemoryFilesystem {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn write(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let fs = MemoryFilesystem::new();
        fs.write("default/0001/01/a.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();

        assert!(fs.exists("default/0001/01/a.jpg").await.unwrap());
        assert_eq!(fs.read("default/0001/01/a.jpg").await.unwrap(), vec![1, 2, 3]);

        fs.delete("default/0001/01/a.jpg").await.unwrap();
        assert!(fs.is_empty().await);
        assert!(fs.read("default/0001/01/a.jpg").await.unwrap_err().is_not_found());

        // Deleting again is fine
        fs.delete("default/0001/01/a.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_invalid_key() {
        let fs = MemoryFilesystem::new();
        let err = fs.write("../x", vec![], "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}

//! In-memory object store.

use std::collections::HashMap;

use async_trait::async_trait;
use expense_core::{ObjectStore, PortError};
use tokio::sync::RwLock;

/// Keeps objects in a map keyed by object key.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, Option<String>)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).map(|(data, _)| data.clone())
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().await.get(key).and_then(|(_, ct)| ct.clone())
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: Option<&str>) -> Result<(), PortError> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (data.to_vec(), content_type.map(str::to_string)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PortError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryObjectStore::new();
        store.put("a/b.jpg", b"img", Some("image/jpeg")).await.unwrap();

        assert_eq!(store.get("a/b.jpg").await, Some(b"img".to_vec()));
        assert_eq!(store.content_type("a/b.jpg").await.as_deref(), Some("image/jpeg"));
        assert_eq!(store.keys().await, vec!["a/b.jpg"]);

        store.delete("a/b.jpg").await.unwrap();
        store.delete("a/b.jpg").await.unwrap();
        assert!(store.get("a/b.jpg").await.is_none());
    }
}

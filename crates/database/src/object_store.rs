//! Filesystem-backed object store for receipt payloads.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use expense_core::{ObjectStore, PortError};

/// Stores objects as files under a root directory, one file per key.
#[derive(Debug, Clone)]
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

    /// Map a key onto a path under the root, rejecting keys that escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, PortError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PortError::InvalidResponse(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: Option<&str>) -> Result<(), PortError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Transport(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        tracing::debug!(key, size = data.len(), content_type, "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PortError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("gastos-objects-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_put_and_delete() {
        let root = temp_root();
        let store = LocalObjectStore::new(&root);

        store
            .put("receipts/cust_1/whatsapp/2026/02/evt_1.jpg", b"jpeg", Some("image/jpeg"))
            .await
            .unwrap();
        let path = root.join("receipts/cust_1/whatsapp/2026/02/evt_1.jpg");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg");

        store.delete("receipts/cust_1/whatsapp/2026/02/evt_1.jpg").await.unwrap();
        assert!(!path.exists());

        // Deleting again is fine.
        store.delete("receipts/cust_1/whatsapp/2026/02/evt_1.jpg").await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let store = LocalObjectStore::new(temp_root());
        assert!(store.put("../outside", b"x", None).await.is_err());
        assert!(store.put("/etc/passwd", b"x", None).await.is_err());
        assert!(store.delete("").await.is_err());
    }
}

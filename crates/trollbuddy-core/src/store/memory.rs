//! In-process store backend.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::{RemoteStore, StoreError, tree};
use crate::ids;

/// JSON tree held in memory.
///
/// Clones of the `Arc` wrapping a `MemoryStore` act as independent clients
/// sharing one database, which is how tests model the organizer and the
/// participant running side by side.
pub struct MemoryStore {
    root: RwLock<Value>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate losing (or regaining) the connection to the store. While
    /// offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.check_online()?;
        let segments = tree::split(path)?;
        let root = self.root.read().await;
        Ok(tree::get_at(&root, &segments)
            .cloned()
            .and_then(tree::normalize))
    }

    async fn push(&self, path: &str, record: Value) -> Result<String, StoreError> {
        self.check_online()?;
        let key = ids::push_key();
        let mut segments = tree::split(path)?;
        segments.push(&key);
        let mut root = self.root.write().await;
        tree::set_at(&mut root, &segments, tree::normalize(record));
        debug!(path, key = %key, "Pushed record");
        Ok(key)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_online()?;
        let segments = tree::split(path)?;
        let mut root = self.root.write().await;
        tree::set_at(&mut root, &segments, tree::normalize(value));
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let segments = tree::split(path)?;
        let mut root = self.root.write().await;
        tree::remove_at(&mut root, &segments);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get("sessions").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_assigns_distinct_keys() {
        let store = MemoryStore::new();
        let a = store.push("sessions", json!({"name": "a"})).await.unwrap();
        let b = store.push("sessions", json!({"name": "b"})).await.unwrap();
        assert_ne!(a, b);

        let children = store.children("sessions").await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(
            store.get(&format!("sessions/{a}/name")).await.unwrap(),
            Some(json!("a"))
        );
    }

    #[tokio::test]
    async fn set_then_remove_prunes_collection() {
        let store = MemoryStore::new();
        store.set("images/s1/100", json!("data:1")).await.unwrap();
        store.remove("images/s1/100").await.unwrap();
        assert!(store.get("images").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_null_removes_node() {
        let store = MemoryStore::new();
        store.set("a/b", json!(1)).await.unwrap();
        store.set("a/b", Value::Null).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_missing_path_succeeds() {
        let store = MemoryStore::new();
        store.remove("nothing/here").await.unwrap();
    }

    #[tokio::test]
    async fn children_of_leaf_is_empty() {
        let store = MemoryStore::new();
        store.set("a", json!("leaf")).await.unwrap();
        assert!(store.children("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("a").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.set("a", json!(1)).await.is_err());
        assert!(store.push("a", json!(1)).await.is_err());
        assert!(store.remove("a").await.is_err());

        store.set_offline(false);
        store.set("a", json!(1)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn invalid_path_is_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set("a/b.c", json!(1)).await,
            Err(StoreError::InvalidPath(_))
        ));
    }
}

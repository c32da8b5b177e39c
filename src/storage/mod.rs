//! Session state persistence for loaded torrents.
//!
//! Defines a minimal create/read/update/delete contract per logical store
//! with an in-memory implementation. Each loaded torrent owns one record in
//! each of three namespaces (metainfo, known peers, tracker statistics),
//! keyed by the torrent's info-hash.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Errors that occur during key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// `create` was called for a key that is already present
    #[error("key {key} already exists")]
    AlreadyExists { key: String },

    /// `read`, `update`, or `delete` was called for an absent key
    #[error("key {key} not found")]
    NotFound { key: String },

    /// Backend-specific failure unrelated to key presence
    #[error("storage backend error: {reason}")]
    Backend { reason: String },
}

/// Minimal CRUD contract over one logical key-value namespace.
///
/// Values are opaque byte blobs; callers serialize their records before
/// writing. Implementations distinguish missing keys from duplicates so
/// callers can branch exhaustively.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores a new key-value pair.
    ///
    /// # Errors
    ///
    /// - `StorageError::AlreadyExists` - If the key is already present
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` - If the key is absent
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replaces the value stored under an existing key.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` - If the key is absent
    async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes a key-value pair; subsequent reads observe `NotFound`.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` - If the key is absent
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory key-value store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_string(),
            });
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entries.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

/// The three per-torrent namespaces used by the session engine.
///
/// Namespaces are independent stores with no cross-namespace atomicity;
/// callers sequence multi-store operations themselves.
#[derive(Clone)]
pub struct SessionStores {
    /// Serialized metainfo (announce tiers plus raw info bytes)
    pub torrents: Arc<dyn KeyValueStore>,
    /// Deduplicated known-peer list
    pub peers: Arc<dyn KeyValueStore>,
    /// Last-seen statistics per tracker URL
    pub stats: Arc<dyn KeyValueStore>,
}

impl SessionStores {
    /// Groups three existing stores into the session namespaces.
    pub fn new(
        torrents: Arc<dyn KeyValueStore>,
        peers: Arc<dyn KeyValueStore>,
        stats: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            torrents,
            peers,
            stats,
        }
    }

    /// Creates three fresh in-memory namespaces.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_read() {
        let store = MemoryStore::new();
        store.create("key", b"value".to_vec()).await.unwrap();
        assert_eq!(store.read("key").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = MemoryStore::new();
        store.create("key", b"first".to_vec()).await.unwrap();
        let result = store.create("key", b"second".to_vec()).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
        // The original value survives the failed create
        assert_eq!(store.read("key").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_read_missing_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read("missing").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_value() {
        let store = MemoryStore::new();
        store.create("key", b"old".to_vec()).await.unwrap();
        store.update("key", b"new".to_vec()).await.unwrap();
        assert_eq!(store.read("key").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update("missing", Vec::new()).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_then_operations_observe_not_found() {
        let store = MemoryStore::new();
        store.create("key", b"value".to_vec()).await.unwrap();
        store.delete("key").await.unwrap();

        assert!(matches!(
            store.read("key").await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.update("key", Vec::new()).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("key").await,
            Err(StorageError::NotFound { .. })
        ));
        // The key can be created again after deletion
        store.create("key", b"again".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_stores_are_independent() {
        let stores = SessionStores::in_memory();
        stores.torrents.create("hash", b"t".to_vec()).await.unwrap();
        assert!(matches!(
            stores.peers.read("hash").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}

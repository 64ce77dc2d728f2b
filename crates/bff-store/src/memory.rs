//! In-process map backend for local development and tests.
//!
//! Expiry is enforced twice: a removal task scheduled at TTL, and the same
//! check again on every access in case the task has not fired yet. Both paths
//! observe the entry's `expires_at`, so an overwrite with a fresh TTL is never
//! clobbered by a stale removal task.

use crate::errors::Result;
use crate::traits::{current_timestamp, merge_json, KvStore, StoredEntry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, StoredEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule_removal(&self, key: String, ttl: Duration) {
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut map = entries.lock().await;
            // Only remove if still expired; the key may have been overwritten
            // with a new TTL in the meantime.
            if map
                .get(&key)
                .is_some_and(|e| e.is_expired(current_timestamp()))
            {
                map.remove(&key);
            }
        });
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = StoredEntry::new(value, ttl);
        self.entries.lock().await.insert(key.to_string(), entry);
        self.schedule_removal(key.to_string(), ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut map = self.entries.lock().await;
        match map.get(key) {
            Some(entry) if entry.is_expired(current_timestamp()) => {
                map.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    async fn update(&self, key: &str, patch: Value) -> Result<()> {
        let mut map = self.entries.lock().await;
        match map.get_mut(key) {
            Some(entry) if !entry.is_expired(current_timestamp()) => {
                merge_json(&mut entry.data, patch);
                Ok(())
            }
            _ => Err(crate::errors::StoreError::NotFound),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        // Remove-then-check under one lock: the consume is atomic, and an
        // expired entry is reported absent even though it was still present.
        let mut map = self.entries.lock().await;
        match map.remove(key) {
            Some(entry) if !entry.is_expired(current_timestamp()) => Ok(Some(entry.data)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("session:abc", json!({"user": "alice"}), Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("session:abc").await.unwrap().unwrap();
        assert_eq!(value["user"], "alice");
    }

    #[tokio::test]
    async fn expired_entry_behaves_as_absent() {
        let store = MemoryStore::new();
        store
            .put("pending:x", json!({"nonce": "n"}), Duration::from_secs(0))
            .await
            .unwrap();

        assert!(store.get("pending:x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_returns_value_exactly_once() {
        let store = MemoryStore::new();
        store
            .put("pending:s1", json!({"code_verifier": "v"}), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.take("pending:s1").await.unwrap().is_some());
        assert!(store.take("pending:s1").await.unwrap().is_none());
        assert!(store.get("pending:s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_unknown_key_is_absent() {
        let store = MemoryStore::new();
        assert!(store.take("pending:never-saved").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_into_existing_entry() {
        let store = MemoryStore::new();
        store
            .put(
                "session:abc",
                json!({"tokens": {"access": "old"}, "claims": {"sub": "a"}}),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        store
            .update("session:abc", json!({"tokens": {"access": "new"}}))
            .await
            .unwrap();

        let value = store.get("session:abc").await.unwrap().unwrap();
        assert_eq!(value["tokens"]["access"], "new");
        assert_eq!(value["claims"]["sub"], "a");
    }

    #[tokio::test]
    async fn update_absent_key_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("session:missing", json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_does_not_resurrect_expired_key() {
        let store = MemoryStore::new();
        store
            .put("session:old", json!({"a": 1}), Duration::from_secs(0))
            .await
            .unwrap();

        let err = store
            .update("session:old", json!({"a": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(store.get("session:old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .put("session:abc", json!({}), Duration::from_secs(60))
            .await
            .unwrap();

        store.delete("session:abc").await.unwrap();
        store.delete("session:abc").await.unwrap();
        assert!(store.get("session:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_refreshes_expiry() {
        let store = MemoryStore::new();
        store
            .put("pending:x", json!({"v": 1}), Duration::from_secs(0))
            .await
            .unwrap();
        store
            .put("pending:x", json!({"v": 2}), Duration::from_secs(60))
            .await
            .unwrap();

        // The stale removal task must not delete the fresh entry.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let value = store.get("pending:x").await.unwrap().unwrap();
        assert_eq!(value["v"], 2);
    }
}

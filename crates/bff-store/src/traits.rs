//! Store trait definition and the physical entry envelope.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Physical representation of a stored value: the caller's attribute map plus
/// creation and expiry instants (unix seconds).
///
/// `expires_at` is authoritative. Backends whose own garbage collection lags
/// behind the nominal TTL must compare it against current time on every read
/// and treat stale-but-present entries as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub data: Value,
    pub created_at: u64,
    pub expires_at: u64,
}

impl StoredEntry {
    pub fn new(data: Value, ttl: Duration) -> Self {
        let now = current_timestamp();
        Self {
            data,
            created_at: now,
            expires_at: now + ttl.as_secs(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Uniform get/put/update/delete-with-TTL interface.
///
/// Backend selection is a deployment-time choice; no caller may depend on
/// backend-specific timing beyond this contract. Single-key operations are
/// individually atomic, which is all the concurrency the callers require.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Insert or overwrite a value and schedule its expiry.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Read a value. Returns `None` if the key is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Shallow-merge `patch` into an existing entry.
    ///
    /// Fails with `StoreError::NotFound` if the key is absent or expired; it
    /// must never resurrect such a key.
    async fn update(&self, key: &str, patch: Value) -> Result<()>;

    /// Atomically read and delete a value (one-time consume).
    ///
    /// Returns the value exactly once; every later call with the same key
    /// returns `None`, as does a call for a key that never existed.
    async fn take(&self, key: &str) -> Result<Option<Value>>;

    /// Remove a key unconditionally. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Shallow merge of JSON objects: top-level keys of `patch` replace the
/// corresponding keys of `base`. Non-object inputs replace `base` entirely.
pub(crate) fn merge_json(base: &mut Value, patch: Value) {
    match (base.as_object_mut(), patch) {
        (Some(base_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                base_map.insert(k, v);
            }
        }
        (_, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_expiry_boundaries() {
        let entry = StoredEntry {
            data: json!({}),
            created_at: 1000,
            expires_at: 1300,
        };
        assert!(!entry.is_expired(1299));
        assert!(entry.is_expired(1300));
        assert!(entry.is_expired(2000));
    }

    #[test]
    fn merge_replaces_top_level_keys() {
        let mut base = json!({"tokens": {"access": "old"}, "claims": {"sub": "a"}});
        merge_json(&mut base, json!({"tokens": {"access": "new"}}));
        assert_eq!(base["tokens"]["access"], "new");
        assert_eq!(base["claims"]["sub"], "a");
    }
}

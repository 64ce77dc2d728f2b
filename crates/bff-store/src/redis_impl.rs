//! Redis backend for real deployments.
//!
//! Redis manages expiry server-side (`SET … EX`), but the contract does not
//! trust it alone: the envelope's `expires_at` is re-checked on every read so
//! a deployment with lagging eviction still reports expired entries as
//! absent. One-time consume maps to `GETDEL`, and merges write back with
//! `SET XX KEEPTTL` so an entry that expired between read and write cannot be
//! resurrected.

use crate::errors::{Result, StoreError};
use crate::traits::{current_timestamp, merge_json, KvStore, StoredEntry};
use async_trait::async_trait;
use fred::prelude::*;
use fred::types::{Expiration, SetOptions};
use serde_json::Value;
use std::time::Duration;

pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Connect to Redis. Reconnects with exponential backoff on drops.
    pub async fn connect(url: &str) -> Result<Self> {
        let config =
            Config::from_url(url).map_err(|e| StoreError::Configuration(e.to_string()))?;
        let client = Client::new(
            config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );
        client.init().await?;
        Ok(Self { client })
    }

    fn decode_live(&self, raw: Option<String>) -> Result<Option<StoredEntry>> {
        match raw {
            Some(s) => {
                let entry: StoredEntry = serde_json::from_str(&s)?;
                if entry.is_expired(current_timestamp()) {
                    Ok(None)
                } else {
                    Ok(Some(entry))
                }
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = StoredEntry::new(value, ttl);
        let serialized = serde_json::to_string(&entry)?;
        let seconds = ttl.as_secs().max(1) as i64;
        self.client
            .set::<(), _, _>(key, serialized, Some(Expiration::EX(seconds)), None, false)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self.client.get(key).await?;
        Ok(self.decode_live(raw)?.map(|e| e.data))
    }

    async fn update(&self, key: &str, patch: Value) -> Result<()> {
        let raw: Option<String> = self.client.get(key).await?;
        let mut entry = self.decode_live(raw)?.ok_or(StoreError::NotFound)?;
        merge_json(&mut entry.data, patch);
        let serialized = serde_json::to_string(&entry)?;

        // XX: write only if the key still exists; KEEPTTL: preserve the
        // server-side expiry set at creation. A key deleted or evicted since
        // the read above makes this a no-op instead of a resurrection.
        let previous: Option<String> = self
            .client
            .set(
                key,
                serialized,
                Some(Expiration::KEEPTTL),
                Some(SetOptions::XX),
                true,
            )
            .await?;
        if previous.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self.client.getdel(key).await?;
        Ok(self.decode_live(raw)?.map(|e| e.data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client.del::<(), _>(key).await?;
        Ok(())
    }
}

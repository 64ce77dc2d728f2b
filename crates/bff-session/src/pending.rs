//! Pending-authorization ledger: the bridge between `/login` and
//! `/callback` for one login attempt.

use crate::errors::Result;
use crate::types::PendingAuthorization;
use bff_store::KvStore;
use std::sync::Arc;
use std::time::Duration;

const PENDING_PREFIX: &str = "pending:";
const PENDING_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct PendingLedger {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl PendingLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: PENDING_TTL,
        }
    }

    /// Override the TTL. Tests use this to exercise expiry without waiting
    /// five minutes.
    pub fn with_ttl(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Stash the verifier and nonce for an in-flight login. `state` is
    /// generator-chosen with 128 bits of entropy, so collisions are not a
    /// concern and no overwrite protection is needed.
    pub async fn save(&self, state: &str, pending: &PendingAuthorization) -> Result<()> {
        let key = format!("{PENDING_PREFIX}{state}");
        self.store
            .put(&key, serde_json::to_value(pending)?, self.ttl)
            .await?;
        Ok(())
    }

    /// One-time consume. Returns the payload exactly once per `state`;
    /// every later call, and any call with an unknown or expired `state`,
    /// returns `None`, which the orchestrator treats as a forged callback.
    pub async fn consume(&self, state: &str) -> Result<Option<PendingAuthorization>> {
        let key = format!("{PENDING_PREFIX}{state}");
        match self.store.take(&key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

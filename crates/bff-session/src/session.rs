//! Session ledger: opaque-id sessions holding token material and verified
//! claims.

use crate::errors::{Result, SessionError};
use crate::types::SessionRecord;
use bff_store::{KvStore, StoreError};
use rand::RngCore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const SESSION_PREFIX: &str = "session:";
const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Generate an unguessable session identifier: 32 bytes of CSPRNG output,
/// hex-encoded to 64 characters.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SessionLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: SESSION_TTL,
        }
    }

    pub fn with_ttl(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Create a session and return its fresh id. The TTL is fixed at
    /// creation and not renewed on access.
    pub async fn create(&self, record: &SessionRecord) -> Result<String> {
        let session_id = generate_session_id();
        let key = format!("{SESSION_PREFIX}{session_id}");
        self.store
            .put(&key, serde_json::to_value(record)?, self.ttl)
            .await?;
        tracing::debug!(sub = %record.id_token_claims.sub, "session created");
        Ok(session_id)
    }

    /// Read a session. Empty, unknown, and expired ids all uniformly yield
    /// `None`.
    pub async fn read(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        if session_id.is_empty() {
            return Ok(None);
        }
        let key = format!("{SESSION_PREFIX}{session_id}");
        match self.store.get(&key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Swap in refreshed tokens and claims. Fails with
    /// `SessionError::NotFound` if the session is gone; the caller must
    /// treat that as an authentication failure, never mint a new session
    /// here.
    pub async fn replace(&self, session_id: &str, record: &SessionRecord) -> Result<()> {
        let key = format!("{SESSION_PREFIX}{session_id}");
        let patch = json!({
            "tokens": record.tokens,
            "id_token_claims": record.id_token_claims,
            "access_token_claims": record.access_token_claims,
        });
        self.store.update(&key, patch).await.map_err(|e| match e {
            StoreError::NotFound => SessionError::NotFound,
            other => SessionError::Store(other),
        })
    }

    /// Unconditional, idempotent delete.
    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        let key = format!("{SESSION_PREFIX}{session_id}");
        self.store.delete(&key).await?;
        tracing::debug!("session destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionTokens;
    use bff_oidc::{AccessTokenClaims, IdTokenClaims};
    use bff_store::MemoryStore;
    use serde_json::Map;

    fn record(access_token: &str) -> SessionRecord {
        SessionRecord {
            tokens: SessionTokens {
                access_token: access_token.to_string(),
                id_token: "IT".to_string(),
                refresh_token: "RT".to_string(),
            },
            id_token_claims: IdTokenClaims {
                sub: "user-123".to_string(),
                exp: 2_000_000_000,
                iat: 1_700_000_000,
                token_use: "id".to_string(),
                nonce: Some("n".to_string()),
                email: Some("alice@example.com".to_string()),
                name: None,
                email_verified: Some(true),
                extra: Map::new(),
            },
            access_token_claims: AccessTokenClaims {
                sub: "user-123".to_string(),
                exp: 2_000_000_000,
                iat: 1_700_000_000,
                token_use: "access".to_string(),
                client_id: Some("test-client".to_string()),
                username: None,
                scope: None,
                extra: Map::new(),
            },
        }
    }

    #[tokio::test]
    async fn create_then_read_returns_payload_unchanged() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        let id = ledger.create(&record("AT")).await.unwrap();

        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let session = ledger.read(&id).await.unwrap().unwrap();
        assert_eq!(session.tokens.access_token, "AT");
        assert_eq!(session.tokens.refresh_token, "RT");
        assert_eq!(
            session.id_token_claims.email.as_deref(),
            Some("alice@example.com")
        );
    }

    #[tokio::test]
    async fn ids_are_unique_across_sessions() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        let a = ledger.create(&record("AT")).await.unwrap();
        let b = ledger.create(&record("AT")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_and_unknown_ids_read_as_absent() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        assert!(ledger.read("").await.unwrap().is_none());
        assert!(ledger.read("deadbeef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_then_read_is_absent_and_idempotent() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        let id = ledger.create(&record("AT")).await.unwrap();

        ledger.destroy(&id).await.unwrap();
        assert!(ledger.read(&id).await.unwrap().is_none());
        ledger.destroy(&id).await.unwrap();
    }

    #[tokio::test]
    async fn replace_swaps_tokens_in_place() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        let id = ledger.create(&record("old-token")).await.unwrap();

        let mut refreshed = record("new-token");
        refreshed.tokens.id_token = "IT2".to_string();
        ledger.replace(&id, &refreshed).await.unwrap();

        let session = ledger.read(&id).await.unwrap().unwrap();
        assert_eq!(session.tokens.access_token, "new-token");
        assert_eq!(session.tokens.id_token, "IT2");
        // The refresh grant reissues no refresh token; the stored one stays.
        assert_eq!(session.tokens.refresh_token, "RT");
    }

    #[tokio::test]
    async fn replace_absent_session_fails() {
        let ledger = SessionLedger::new(Arc::new(MemoryStore::new()));
        let err = ledger.replace("deadbeef", &record("AT")).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent() {
        let ledger =
            SessionLedger::with_ttl(Arc::new(MemoryStore::new()), Duration::from_secs(0));
        let id = ledger.create(&record("AT")).await.unwrap();
        assert!(ledger.read(&id).await.unwrap().is_none());
    }
}

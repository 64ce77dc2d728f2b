//! Shared application state handed to every handler.

use crate::config::Config;
use bff_oidc::{ProviderClient, ProviderConfig, TokenVerifier};
use bff_session::{PendingLedger, SessionLedger};
use bff_store::KvStore;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub provider: ProviderClient,
    pub verifier: TokenVerifier,
    pub sessions: SessionLedger,
    pub pending: PendingLedger,
}

impl AppState {
    pub fn new(config: Config, provider_config: ProviderConfig, store: Arc<dyn KvStore>) -> Self {
        // One connection pool for both the token endpoint and the JWKS.
        let http = reqwest::Client::new();
        let verifier = TokenVerifier::new(http.clone(), &provider_config);
        let provider = ProviderClient::new(http, provider_config);

        Self {
            config,
            provider,
            verifier,
            sessions: SessionLedger::new(store.clone()),
            pending: PendingLedger::new(store),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AppState;
    use crate::config::Config;
    use bff_oidc::ProviderConfig;
    use bff_store::{KvStore, MemoryStore, StoreBackend};
    use std::sync::Arc;

    pub(crate) fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            region: "ap-northeast-1".to_string(),
            user_pool_id: "ap-northeast-1_TEST".to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            cognito_domain: "bff.auth.ap-northeast-1.amazoncognito.com".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            frontend_origin: "http://localhost:5173".to_string(),
            logout_uri: "http://localhost:5173".to_string(),
            secure_cookies: false,
            cross_site_cookies: false,
            store_backend: StoreBackend::Memory,
        }
    }

    /// In-memory state pointed at an arbitrary provider endpoint set. Returns
    /// the backing store so tests can inspect raw records.
    pub(crate) fn state_with_provider(
        provider: ProviderConfig,
    ) -> (Arc<AppState>, Arc<dyn KvStore>) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(test_config(), provider, store.clone()));
        (state, store)
    }

    pub(crate) fn cognito_state() -> (Arc<AppState>, Arc<dyn KvStore>) {
        state_with_provider(test_config().provider_config())
    }
}

//! Backend selection, resolved once at construction.

use crate::errors::Result;
use crate::memory::MemoryStore;
use crate::redis_impl::RedisStore;
use crate::traits::KvStore;
use std::sync::Arc;

/// Closed set of store backends, chosen by deployment configuration.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Process-local map. Data is lost on restart; development and tests.
    Memory,
    /// Redis with server-managed expiry.
    Redis { url: String },
}

/// Build the configured store. All callers hold the store behind the trait;
/// the choice of backend is invisible past this point.
pub async fn build_store(backend: &StoreBackend) -> Result<Arc<dyn KvStore>> {
    match backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory session store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis { url } => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("using redis session store");
            Ok(Arc::new(store))
        }
    }
}

//! Pool registry.
//!
//! Keeps at most one live pool per [`PoolKey`] and hands out connections
//! from it, creating the pool on first use.
//!
//! # Concurrency
//!
//! - The map is guarded by a `RwLock`; every lock is released before
//!   awaiting the pool library (creation, borrowing and closing all run
//!   outside the lock), so slow pools never stall unrelated keys.
//! - Each key maps to an `OnceCell`. Concurrent first requests for the same
//!   key wait on that cell, so only one pool is ever constructed for it.
//! - A failed construction leaves the cell empty. Empty cells count as
//!   absent, and the next request retries.
//! - `close_pool` may remove a cell whose pool is still being built. The
//!   builder notices the cell is no longer registered, closes the new pool
//!   and reports a connection error instead of leaking it.

use crate::config::PoolOptions;
use crate::db::pool::SqlxPoolProvider;
use crate::db::pool_config::PoolConfig;
use crate::db::provider::{PoolHandle, PoolProvider};
use crate::error::{DbError, DbResult};
use crate::models::Credentials;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Connection type handed out by a registry backed by provider `P`.
pub type RegistryConnection<P> = <<P as PoolProvider>::Handle as PoolHandle>::Connection;

type PoolCell<H> = Arc<OnceCell<H>>;

/// Registry key: engine variant name and database name joined by `_`.
///
/// Host, port and login are not part of the key, so credentials that differ
/// only in those share a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey(String);

impl PoolKey {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self(format!(
            "{}_{}",
            credentials.engine().variant_name(),
            credentials.database()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed collection of lazily created connection pools.
pub struct PoolRegistry<P: PoolProvider = SqlxPoolProvider> {
    provider: P,
    options: PoolOptions,
    pools: RwLock<HashMap<PoolKey, PoolCell<P::Handle>>>,
}

impl<P: PoolProvider> PoolRegistry<P> {
    /// Create a registry with the default pool options.
    pub fn new(provider: P) -> Self {
        Self::with_options(provider, PoolOptions::default())
    }

    pub fn with_options(provider: P, options: PoolOptions) -> Self {
        Self {
            provider,
            options,
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Borrow a connection from the pool for `credentials`, creating the
    /// pool first if none is registered under its key.
    pub async fn get_connection(
        &self,
        credentials: &Credentials,
    ) -> DbResult<RegistryConnection<P>> {
        let key = PoolKey::from_credentials(credentials);

        if let Some(cell) = self.ready_cell(&key).await {
            if let Some(handle) = cell.get() {
                return self.borrow(&key, handle).await;
            }
        }

        // Assemble before touching the map so configuration errors leave it untouched
        let config = PoolConfig::assemble(key.as_str(), credentials, &self.options)?;
        let cell = self.cell_or_insert(&key).await;

        let handle = cell.get_or_try_init(|| self.open_pool(&config)).await?;

        if !self.is_registered(&key, &cell).await {
            // Removed by close_pool/close_all while it was being built
            handle.close().await;
            return Err(DbError::connection(
                format!("Pool '{}' was closed while it was being created", key),
                "Request a new connection",
            ));
        }

        self.borrow(&key, handle).await
    }

    /// Close and forget the pool for `credentials`. No-op if absent.
    pub async fn close_pool(&self, credentials: &Credentials) {
        let key = PoolKey::from_credentials(credentials);

        let removed = {
            let mut pools = self.pools.write().await;
            pools.remove(&key)
        }; // Lock released here

        match removed.as_ref().map(|cell| cell.get()) {
            Some(Some(handle)) => {
                info!(pool = %key, "Closing connection pool");
                handle.close().await;
            }
            Some(None) => debug!(pool = %key, "Removed pool entry that was not open"),
            None => debug!(pool = %key, "No pool to close"),
        }
    }

    /// Close every pool and empty the registry.
    pub async fn close_all(&self) {
        // Drain pools under lock, close outside lock
        let pools_to_close: Vec<_> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        }; // Lock released here

        let mut closed = 0usize;
        for (key, cell) in pools_to_close {
            if let Some(handle) = cell.get() {
                info!(pool = %key, "Closing connection pool");
                handle.close().await;
                closed += 1;
            }
        }
        info!(closed, "All connection pools closed");
    }

    /// Returns true if an open pool is registered for `credentials`.
    pub async fn contains(&self, credentials: &Credentials) -> bool {
        let key = PoolKey::from_credentials(credentials);
        self.ready_cell(&key).await.is_some()
    }

    /// Number of open pools.
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|cell| cell.initialized()).count()
    }

    /// Keys of the open pools, sorted.
    pub async fn keys(&self) -> Vec<PoolKey> {
        let pools = self.pools.read().await;
        let mut keys: Vec<_> = pools
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    async fn ready_cell(&self, key: &PoolKey) -> Option<PoolCell<P::Handle>> {
        let pools = self.pools.read().await;
        pools
            .get(key)
            .filter(|cell| cell.initialized())
            .map(Arc::clone)
    }

    async fn cell_or_insert(&self, key: &PoolKey) -> PoolCell<P::Handle> {
        {
            let pools = self.pools.read().await;
            if let Some(cell) = pools.get(key) {
                return Arc::clone(cell);
            }
        }

        let mut pools = self.pools.write().await;
        // Double-check after acquiring write lock
        Arc::clone(
            pools
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    async fn is_registered(&self, key: &PoolKey, cell: &PoolCell<P::Handle>) -> bool {
        let pools = self.pools.read().await;
        pools
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell))
    }

    async fn open_pool(&self, config: &PoolConfig) -> DbResult<P::Handle> {
        info!(
            pool = %config.pool_name,
            engine = %config.engine,
            mode = config.mode(),
            max_pool_size = config.max_pool_size,
            min_idle = config.min_idle,
            "Creating connection pool"
        );

        match self.provider.open(config).await {
            Ok(handle) => {
                info!(pool = %config.pool_name, "Connection pool created");
                Ok(handle)
            }
            Err(e) => {
                warn!(pool = %config.pool_name, error = %e, "Failed to create connection pool");
                Err(e)
            }
        }
    }

    async fn borrow(&self, key: &PoolKey, handle: &P::Handle) -> DbResult<RegistryConnection<P>> {
        let connection = handle.borrow().await.inspect_err(|e| {
            warn!(pool = %key, error = %e, "Failed to borrow connection");
        })?;
        debug!(pool = %key, "Borrowed connection");
        Ok(connection)
    }
}

impl<P: PoolProvider + Default> Default for PoolRegistry<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: PoolProvider> std::fmt::Debug for PoolRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

static GLOBAL_REGISTRY: OnceLock<PoolRegistry> = OnceLock::new();

/// Process-wide registry backed by sqlx, created on first use.
///
/// Prefer an explicit [`PoolRegistry`] where one can be passed around; call
/// `global().close_all()` on shutdown.
pub fn global() -> &'static PoolRegistry {
    GLOBAL_REGISTRY.get_or_init(PoolRegistry::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Engine;

    fn credentials(engine: Engine, host: &str, database: &str) -> Credentials {
        Credentials::builder()
            .engine(engine)
            .host(host)
            .database(database)
            .build()
            .unwrap()
    }

    #[test]
    fn test_key_is_variant_and_database() {
        let key = PoolKey::from_credentials(&credentials(Engine::PostgreSQL, "a", "mat"));
        assert_eq!(key.as_str(), "POSTGRESQL_mat");
        assert_eq!(key.to_string(), "POSTGRESQL_mat");

        let key = PoolKey::from_credentials(&credentials(Engine::SQLServer, "a", "sales"));
        assert_eq!(key.as_str(), "SQLSERVER_sales");
    }

    #[test]
    fn test_key_ignores_host_port_and_login() {
        let a = credentials(Engine::MySQL, "a", "shop");
        let b = a
            .to_builder()
            .host("b")
            .port(3307)
            .username("other")
            .password("secret")
            .build()
            .unwrap();
        assert_eq!(PoolKey::from_credentials(&a), PoolKey::from_credentials(&b));
    }

    #[test]
    fn test_key_distinguishes_engine() {
        let pg = credentials(Engine::PostgreSQL, "h", "mat");
        let my = credentials(Engine::MySQL, "h", "mat");
        assert_ne!(PoolKey::from_credentials(&pg), PoolKey::from_credentials(&my));
    }

    #[tokio::test]
    async fn test_new_registry_is_empty() {
        let registry = PoolRegistry::new(SqlxPoolProvider);
        assert_eq!(registry.pool_count().await, 0);
        assert!(registry.keys().await.is_empty());
        assert_eq!(registry.options(), &PoolOptions::default());
    }

    #[tokio::test]
    async fn test_close_on_empty_registry_is_noop() {
        let registry = PoolRegistry::new(SqlxPoolProvider);
        let creds = credentials(Engine::PostgreSQL, "localhost", "mat");
        registry.close_pool(&creds).await;
        registry.close_all().await;
        assert!(!registry.contains(&creds).await);
    }

    #[test]
    fn test_global_registry_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}

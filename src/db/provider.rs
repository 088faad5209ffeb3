//! Pool library contract.
//!
//! The registry never talks to a driver directly. It asks a [`PoolProvider`]
//! to open a pool from a [`PoolConfig`] and then borrows connections from the
//! resulting [`PoolHandle`]. [`SqlxPoolProvider`](super::SqlxPoolProvider) is
//! the production binding; tests plug in their own.

use crate::db::pool_config::PoolConfig;
use crate::error::DbResult;
use async_trait::async_trait;

/// A live connection pool.
#[async_trait]
pub trait PoolHandle: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Borrow a connection, waiting up to the pool's acquire timeout.
    async fn borrow(&self) -> DbResult<Self::Connection>;

    /// Close the pool and its connections. Must be idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Factory for pools.
#[async_trait]
pub trait PoolProvider: Send + Sync + 'static {
    type Handle: PoolHandle;

    /// Open a pool for `config`.
    ///
    /// Any failure, including a configuration the driver rejects, is a
    /// backend error.
    async fn open(&self, config: &PoolConfig) -> DbResult<Self::Handle>;
}

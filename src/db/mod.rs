//! Connection pool layer.
//!
//! This module provides:
//! - Pool configuration assembly from credentials
//! - The pool library contract (`PoolProvider`, `PoolHandle`)
//! - The sqlx binding of that contract
//! - Driver dispatch macros for reducing code duplication
//! - The keyed pool registry

#[macro_use]
pub mod macros;
pub mod pool;
pub mod pool_config;
pub mod provider;
pub mod registry;

pub use pool::{ConnectOptions, DbConnection, DbPool, SqlxPool, SqlxPoolProvider};
pub use pool_config::{PoolConfig, PoolSource};
pub use provider::{PoolHandle, PoolProvider};
pub use registry::{PoolKey, PoolRegistry, RegistryConnection, global};

//! DB Pool Registry Library
//!
//! Opens and reuses pooled connections to PostgreSQL, MySQL, Oracle and SQL
//! Server databases from a single entry point. Callers describe a database
//! with [`Credentials`]; the [`PoolRegistry`] lazily creates one pool per
//! engine and database name and lends connections from it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::PoolOptions;
pub use db::{PoolKey, PoolRegistry};
pub use error::{DbError, DbResult, ErrorKind};
pub use models::{Credentials, CredentialsBuilder, Engine};

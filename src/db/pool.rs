//! sqlx binding of the pool library contract.
//!
//! URL-mode configurations are handed to the sqlx driver named by the URL
//! scheme once the `jdbc:` prefix is stripped. DataSource-mode
//! configurations are mapped per data-source class; only the PostgreSQL
//! class has a sqlx driver behind it.

use crate::db::pool_config::{
    PROP_DATABASE_NAME, PROP_PASSWORD, PROP_PORT_NUMBER, PROP_SERVER_NAME, PROP_USER, PoolConfig,
    PoolSource,
};
use crate::db::provider::{PoolHandle, PoolProvider};
use crate::error::{DbError, DbResult};
use crate::models::Engine;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::{
    Connection, MySql, MySqlConnection, MySqlPool, PgConnection, PgPool, Postgres,
    mysql::MySqlConnectOptions, mysql::MySqlPoolOptions, postgres::PgConnectOptions,
    postgres::PgPoolOptions,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const JDBC_SCHEME: &str = "jdbc:";

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.close().await,
            Postgres(pool) => pool.close().await,
        })
    }

    pub fn is_closed(&self) -> bool {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.is_closed(),
            Postgres(pool) => pool.is_closed(),
        })
    }

    /// Number of open connections, idle or in use.
    pub fn size(&self) -> u32 {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.size(),
            Postgres(pool) => pool.size(),
        })
    }

    pub fn num_idle(&self) -> usize {
        crate::impl_db_dispatch!(self, {
            MySql(pool) => pool.num_idle(),
            Postgres(pool) => pool.num_idle(),
        })
    }

    pub fn engine(&self) -> Engine {
        match self {
            DbPool::MySql(_) => Engine::MySQL,
            DbPool::Postgres(_) => Engine::PostgreSQL,
        }
    }
}

/// A connection borrowed from a [`DbPool`].
///
/// Dropping it returns the connection to its pool.
#[derive(Debug)]
pub enum DbConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
}

impl DbConnection {
    pub fn engine(&self) -> Engine {
        match self {
            DbConnection::MySql(_) => Engine::MySQL,
            DbConnection::Postgres(_) => Engine::PostgreSQL,
        }
    }

    pub fn as_mysql(&mut self) -> Option<&mut MySqlConnection> {
        match self {
            DbConnection::MySql(conn) => Some(&mut **conn),
            DbConnection::Postgres(_) => None,
        }
    }

    pub fn as_postgres(&mut self) -> Option<&mut PgConnection> {
        match self {
            DbConnection::MySql(_) => None,
            DbConnection::Postgres(conn) => Some(&mut **conn),
        }
    }

    /// Check that the server still answers on this connection.
    pub async fn ping(&mut self) -> DbResult<()> {
        match self {
            DbConnection::MySql(conn) => conn.ping().await?,
            DbConnection::Postgres(conn) => conn.ping().await?,
        }
        Ok(())
    }

    /// Returns true if a ping succeeds within `timeout`.
    pub async fn is_valid(&mut self, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, self.ping()).await, Ok(Ok(())))
    }

    /// Close the physical connection instead of returning it to the pool.
    pub async fn close(self) -> DbResult<()> {
        match self {
            DbConnection::MySql(conn) => conn.close().await?,
            DbConnection::Postgres(conn) => conn.close().await?,
        }
        Ok(())
    }
}

/// Pool handle produced by [`SqlxPoolProvider`].
#[derive(Debug, Clone)]
pub struct SqlxPool {
    pool: DbPool,
    acquire_timeout: Duration,
}

impl SqlxPool {
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl PoolHandle for SqlxPool {
    type Connection = DbConnection;

    async fn borrow(&self) -> DbResult<DbConnection> {
        let result = match &self.pool {
            DbPool::MySql(pool) => pool.acquire().await.map(DbConnection::MySql),
            DbPool::Postgres(pool) => pool.acquire().await.map(DbConnection::Postgres),
        };
        result.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => DbError::timeout(
                "connection pool acquire",
                self.acquire_timeout.as_secs(),
            ),
            other => other.into(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Driver-specific connect options for one pool.
#[derive(Debug, Clone)]
pub enum ConnectOptions {
    MySql(MySqlConnectOptions),
    Postgres(PgConnectOptions),
}

impl ConnectOptions {
    /// Translate a pool configuration into sqlx connect options.
    pub fn from_config(config: &PoolConfig) -> DbResult<Self> {
        match &config.source {
            PoolSource::Url {
                jdbc_url,
                username,
                password,
            } => Self::from_url(jdbc_url, username, password),
            PoolSource::DataSource {
                class_id,
                properties,
            } => Self::from_datasource(class_id, properties),
        }
    }

    fn from_url(jdbc_url: &str, username: &str, password: &str) -> DbResult<Self> {
        let url = jdbc_url.strip_prefix(JDBC_SCHEME).unwrap_or(jdbc_url);

        if url.starts_with("mysql://") {
            let options = MySqlConnectOptions::from_str(url)
                .map_err(|e| {
                    DbError::connection(
                        format!("Invalid MySQL connection URL: {}", e),
                        "Check host and database name for characters that are not valid in a URL",
                    )
                })?
                .username(username)
                .password(password)
                .charset("utf8mb4");
            Ok(Self::MySql(options))
        } else if url.starts_with("postgresql://") {
            let options = PgConnectOptions::from_str(url)
                .map_err(|e| {
                    DbError::connection(
                        format!("Invalid PostgreSQL connection URL: {}", e),
                        "Check host and database name for characters that are not valid in a URL",
                    )
                })?
                .username(username)
                .password(password);
            Ok(Self::Postgres(options))
        } else {
            Err(DbError::connection(
                format!("No driver available for connection URL '{}'", jdbc_url),
                "Only the PostgreSQL and MySQL drivers are available",
            ))
        }
    }

    fn from_datasource(class_id: &str, properties: &BTreeMap<String, Value>) -> DbResult<Self> {
        if Engine::PostgreSQL.native_datasource_id() != Some(class_id) {
            return Err(DbError::connection(
                format!("No driver available for data source class '{}'", class_id),
                "Only the PostgreSQL and MySQL drivers are available",
            ));
        }

        let options = PgConnectOptions::new()
            .host(text_property(properties, PROP_SERVER_NAME)?)
            .port(port_property(properties)?)
            .database(text_property(properties, PROP_DATABASE_NAME)?)
            .username(text_property(properties, PROP_USER)?)
            .password(text_property(properties, PROP_PASSWORD)?);
        Ok(Self::Postgres(options))
    }
}

fn text_property<'a>(properties: &'a BTreeMap<String, Value>, key: &str) -> DbResult<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing_property(key))
}

fn port_property(properties: &BTreeMap<String, Value>) -> DbResult<u16> {
    properties
        .get(PROP_PORT_NUMBER)
        .and_then(Value::as_u64)
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| missing_property(PROP_PORT_NUMBER))
}

fn missing_property(key: &str) -> DbError {
    DbError::connection(
        format!("Data source property '{}' is missing or invalid", key),
        "Check the data source properties",
    )
}

/// Opens sqlx pools for the PostgreSQL and MySQL engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxPoolProvider;

#[async_trait]
impl PoolProvider for SqlxPoolProvider {
    type Handle = SqlxPool;

    async fn open(&self, config: &PoolConfig) -> DbResult<SqlxPool> {
        let options = ConnectOptions::from_config(config)?;
        let idle_timeout = Some(config.idle_timeout);

        debug!(pool = %config.pool_name, "Connecting pool");

        let pool = match options {
            ConnectOptions::MySql(options) => {
                let pool = MySqlPoolOptions::new()
                    .min_connections(config.min_idle)
                    .max_connections(config.max_pool_size)
                    .acquire_timeout(config.acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(config.test_before_acquire)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(config, e))?;
                DbPool::MySql(pool)
            }
            ConnectOptions::Postgres(options) => {
                let pool = PgPoolOptions::new()
                    .min_connections(config.min_idle)
                    .max_connections(config.max_pool_size)
                    .acquire_timeout(config.acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(config.test_before_acquire)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(config, e))?;
                DbPool::Postgres(pool)
            }
        };

        Ok(SqlxPool {
            pool,
            acquire_timeout: config.acquire_timeout,
        })
    }
}

fn connect_error(config: &PoolConfig, error: sqlx::Error) -> DbError {
    if let sqlx::Error::PoolTimedOut = error {
        return DbError::timeout(
            format!("connecting pool {}", config.pool_name),
            config.acquire_timeout.as_secs(),
        );
    }
    DbError::connection(
        format!("Failed to connect to {}: {}", config.pool_name, error),
        connection_suggestion(config.engine, &error),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(engine: Engine, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", engine);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    format!(
        "Verify host and port: {} listens on {} by default",
        engine,
        engine.default_port()
    )
}

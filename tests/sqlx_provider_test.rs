//! Integration tests for the sqlx-backed registry.
//!
//! Tests that need a live server read its location from the environment and
//! skip when it is not set:
//!
//! - `TEST_POSTGRES_HOST`, `TEST_POSTGRES_PORT`, `TEST_POSTGRES_DB`,
//!   `TEST_POSTGRES_USER`, `TEST_POSTGRES_PASSWORD`
//! - `TEST_MYSQL_HOST`, `TEST_MYSQL_PORT`, `TEST_MYSQL_DB`,
//!   `TEST_MYSQL_USER`, `TEST_MYSQL_PASSWORD`

use db_pool_registry::config::PoolOptions;
use db_pool_registry::db::{PoolHandle, PoolRegistry, SqlxPoolProvider};
use db_pool_registry::models::{Credentials, Engine};
use std::time::Duration;

fn live_credentials(engine: Engine, prefix: &str) -> Option<Credentials> {
    let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

    let host = var("HOST")?;
    let port = var("PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(engine.default_port());
    let database = var("DB")?;

    Credentials::builder()
        .engine(engine)
        .host(host)
        .port(port)
        .database(database)
        .username(var("USER").unwrap_or_default())
        .password(var("PASSWORD").unwrap_or_default())
        .build()
        .ok()
}

fn fast_failing_options() -> PoolOptions {
    PoolOptions {
        acquire_timeout_secs: Some(1),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_engines_without_driver_fail_with_backend_error() {
    let registry = PoolRegistry::new(SqlxPoolProvider);

    for (engine, database) in [(Engine::Oracle, "ORCL"), (Engine::SQLServer, "sales")] {
        let creds = Credentials::builder()
            .engine(engine)
            .host("127.0.0.1")
            .port(engine.default_port())
            .database(database)
            .build()
            .unwrap();

        let err = registry.get_connection(&creds).await.unwrap_err();
        assert!(err.is_backend());
        assert!(
            err.to_string()
                .contains(engine.native_datasource_id().unwrap())
        );
        assert!(!registry.contains(&creds).await);
    }
    assert_eq!(registry.pool_count().await, 0);
}

#[tokio::test]
async fn test_unreachable_server_is_backend_error_and_not_registered() {
    let registry = PoolRegistry::with_options(SqlxPoolProvider, fast_failing_options());
    let creds = Credentials::builder()
        .engine(Engine::MySQL)
        .host("127.0.0.1")
        .port(1)
        .database("shop")
        .username("root")
        .build()
        .unwrap();

    let err = registry.get_connection(&creds).await.unwrap_err();
    assert!(err.is_backend(), "unexpected error: {}", err);
    assert!(!registry.contains(&creds).await);
}

#[tokio::test]
async fn test_postgres_connection_roundtrip() {
    let Some(creds) = live_credentials(Engine::PostgreSQL, "TEST_POSTGRES") else {
        eprintln!("Skipping test: TEST_POSTGRES_HOST/TEST_POSTGRES_DB not set");
        return;
    };

    let registry = PoolRegistry::new(SqlxPoolProvider);

    let mut conn = registry.get_connection(&creds).await.unwrap();
    assert_eq!(conn.engine(), Engine::PostgreSQL);
    assert!(conn.is_valid(Duration::from_secs(5)).await);

    let value: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(conn.as_postgres().unwrap())
        .await
        .unwrap();
    assert_eq!(value, 1);
    drop(conn);

    // Single connection per pool: the second borrow reuses the returned one
    let conn = registry.get_connection(&creds).await.unwrap();
    drop(conn);
    assert_eq!(registry.pool_count().await, 1);

    registry.close_all().await;
    assert_eq!(registry.pool_count().await, 0);
}

#[tokio::test]
async fn test_postgres_single_connection_pool_times_out_when_busy() {
    let Some(creds) = live_credentials(Engine::PostgreSQL, "TEST_POSTGRES") else {
        eprintln!("Skipping test: TEST_POSTGRES_HOST/TEST_POSTGRES_DB not set");
        return;
    };

    let registry = PoolRegistry::with_options(SqlxPoolProvider, fast_failing_options());

    let held = registry.get_connection(&creds).await.unwrap();
    let err = registry.get_connection(&creds).await.unwrap_err();
    assert!(err.is_backend());
    assert!(registry.contains(&creds).await);
    drop(held);

    registry.close_pool(&creds).await;
    assert!(!registry.contains(&creds).await);
}

#[tokio::test]
async fn test_mysql_connection_roundtrip() {
    let Some(creds) = live_credentials(Engine::MySQL, "TEST_MYSQL") else {
        eprintln!("Skipping test: TEST_MYSQL_HOST/TEST_MYSQL_DB not set");
        return;
    };

    let registry = PoolRegistry::new(SqlxPoolProvider);

    let mut conn = registry.get_connection(&creds).await.unwrap();
    assert_eq!(conn.engine(), Engine::MySQL);
    conn.ping().await.unwrap();
    assert!(conn.as_postgres().is_none());

    let value: i64 = sqlx::query_scalar("SELECT 1")
        .fetch_one(conn.as_mysql().unwrap())
        .await
        .unwrap();
    assert_eq!(value, 1);
    drop(conn);

    registry.close_all().await;
}

#[tokio::test]
async fn test_sqlx_pool_close_is_idempotent() {
    let Some(creds) = live_credentials(Engine::PostgreSQL, "TEST_POSTGRES") else {
        eprintln!("Skipping test: TEST_POSTGRES_HOST/TEST_POSTGRES_DB not set");
        return;
    };

    use db_pool_registry::db::{PoolConfig, PoolProvider};

    let config = PoolConfig::assemble("POSTGRESQL_test", &creds, &PoolOptions::default()).unwrap();
    let pool = SqlxPoolProvider.open(&config).await.unwrap();
    assert_eq!(pool.pool().engine(), Engine::PostgreSQL);
    assert!(!pool.is_closed());

    pool.close().await;
    pool.close().await;
    assert!(pool.is_closed());
    assert!(pool.borrow().await.is_err());
}

//! db-pool-check - Main entry point.
//!
//! Opens a pooled connection to the described database, checks that it is
//! usable and closes the pool again.

use clap::Parser;
use db_pool_registry::config::Config;
use db_pool_registry::db::{PoolRegistry, SqlxPoolProvider};
use db_pool_registry::models::Credentials;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    let credentials = Credentials::builder()
        .engine(config.engine)
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .build()?;

    info!(
        engine = %credentials.engine(),
        url = %credentials.connection_url(),
        "Checking database connection"
    );

    let registry = PoolRegistry::with_options(SqlxPoolProvider, config.pool_options());

    let result = match registry.get_connection(&credentials).await {
        Ok(mut connection) => {
            let valid = connection.is_valid(config.validate_timeout()).await;
            drop(connection);
            Ok(valid)
        }
        Err(e) => Err(e),
    };

    registry.close_all().await;

    match result {
        Ok(true) => {
            info!("Connection established and valid");
            println!("Connection to {} succeeded", credentials.connection_url());
            Ok(())
        }
        Ok(false) => {
            warn!(
                timeout_secs = config.validate_timeout,
                "Connection established but did not answer in time"
            );
            Err(format!(
                "Connection to {} is not valid",
                credentials.connection_url()
            )
            .into())
        }
        Err(e) => {
            error!(error = %e, suggestion = ?e.suggestion(), "Connection failed");
            Err(e.into())
        }
    }
}

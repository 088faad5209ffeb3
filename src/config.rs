//! Configuration handling.
//!
//! [`PoolOptions`] carries the pool sizing and timeout policy applied to every
//! pool a registry creates. [`Config`] is the command line of the
//! `db-pool-check` binary.

use crate::error::{DbError, DbResult};
use crate::models::Engine;
use clap::Parser;
use std::time::Duration;

// Pool configuration defaults
pub const DEFAULT_MAX_POOL_SIZE: u32 = 1;
pub const DEFAULT_MIN_IDLE: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_VALIDATE_TIMEOUT_SECS: u64 = 5;

/// Connection pool configuration options.
///
/// Unset fields fall back to the defaults above. The defaults keep a single
/// live connection per pool, which is what a desktop client needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in a pool (default: 1)
    pub max_pool_size: Option<u32>,
    /// Connections kept open while idle (default: 1)
    pub min_idle: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    pub fn max_pool_size_or_default(&self) -> u32 {
        self.max_pool_size.unwrap_or(DEFAULT_MAX_POOL_SIZE)
    }

    pub fn min_idle_or_default(&self) -> u32 {
        self.min_idle.unwrap_or(DEFAULT_MIN_IDLE)
    }

    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate the effective values (explicit or default).
    pub fn validate(&self) -> DbResult<()> {
        let max = self.max_pool_size_or_default();
        let min = self.min_idle_or_default();
        if max == 0 {
            return Err(DbError::configuration(
                "max_pool_size must be greater than 0",
            ));
        }
        if min > max {
            return Err(DbError::configuration(format!(
                "min_idle ({}) cannot exceed max_pool_size ({})",
                min, max
            )));
        }
        if self.acquire_timeout_or_default() == 0 {
            return Err(DbError::configuration(
                "acquire_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Command line of the connection check binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "db-pool-check")]
#[command(about = "Open a pooled connection to a database and check that it is usable")]
#[command(version)]
pub struct Config {
    /// Database engine
    #[arg(long, value_enum)]
    pub engine: Engine,

    /// Database server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Database server port
    #[arg(long, default_value_t = 5432)]
    pub port: u16,

    /// Database name
    #[arg(long, short = 'd')]
    pub database: String,

    /// Login user
    #[arg(long, env = "DB_USER", default_value = "")]
    pub user: String,

    /// Login password
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Maximum connections in the pool
    #[arg(long)]
    pub max_pool_size: Option<u32>,

    /// Connection acquire timeout in seconds
    #[arg(long)]
    pub acquire_timeout: Option<u64>,

    /// Seconds allowed for the validity check of the borrowed connection
    #[arg(long, default_value_t = DEFAULT_VALIDATE_TIMEOUT_SECS)]
    pub validate_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable JSON-formatted logs
    #[arg(long)]
    pub json_logs: bool,
}

impl Config {
    /// Pool options derived from the command line.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_pool_size: self.max_pool_size,
            acquire_timeout_secs: self.acquire_timeout,
            ..PoolOptions::default()
        }
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.validate_timeout)
    }
}

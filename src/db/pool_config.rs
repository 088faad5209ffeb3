//! Pool configuration assembly.
//!
//! Turns a [`Credentials`] value into the configuration handed to the pool
//! library. Engines without a native data-source class are configured from
//! their connection URL; the others from discrete data-source properties,
//! in which case no URL is set and the driver composes its own.

use crate::config::PoolOptions;
use crate::error::DbResult;
use crate::models::{Credentials, Engine};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub const PROP_SERVER_NAME: &str = "serverName";
pub const PROP_PORT_NUMBER: &str = "portNumber";
pub const PROP_DATABASE_NAME: &str = "databaseName";
pub const PROP_USER: &str = "user";
pub const PROP_PASSWORD: &str = "password";

/// Where the pool library gets its connection parameters from.
#[derive(Clone, PartialEq)]
pub enum PoolSource {
    /// URL-mode: a connection URL plus separate login.
    Url {
        jdbc_url: String,
        username: String,
        password: String,
    },
    /// DataSource-mode: a driver data-source class configured by properties.
    DataSource {
        class_id: String,
        properties: BTreeMap<String, Value>,
    },
}

impl std::fmt::Debug for PoolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolSource::Url {
                jdbc_url, username, ..
            } => f
                .debug_struct("Url")
                .field("jdbc_url", jdbc_url)
                .field("username", username)
                .field("password", &"****")
                .finish(),
            PoolSource::DataSource {
                class_id,
                properties,
            } => {
                let masked: BTreeMap<&str, &Value> = properties
                    .iter()
                    .filter(|(key, _)| key.as_str() != PROP_PASSWORD)
                    .map(|(key, value)| (key.as_str(), value))
                    .collect();
                f.debug_struct("DataSource")
                    .field("class_id", class_id)
                    .field("properties", &masked)
                    .finish_non_exhaustive()
            }
        }
    }
}

/// Everything the pool library needs to build one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Registry key of the pool, used for logging.
    pub pool_name: String,
    pub engine: Engine,
    pub source: PoolSource,
    pub max_pool_size: u32,
    pub min_idle: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub test_before_acquire: bool,
}

impl PoolConfig {
    /// Assemble the pool configuration for `credentials`.
    ///
    /// Fails with a configuration error when `options` are invalid.
    pub fn assemble(
        pool_name: impl Into<String>,
        credentials: &Credentials,
        options: &PoolOptions,
    ) -> DbResult<Self> {
        options.validate()?;

        let engine = credentials.engine();
        let source = match engine.native_datasource_id() {
            None => PoolSource::Url {
                jdbc_url: credentials.connection_url().to_string(),
                username: credentials.username().to_string(),
                password: credentials.password().to_string(),
            },
            Some(class_id) => {
                let mut properties = BTreeMap::new();
                properties.insert(PROP_SERVER_NAME.to_string(), Value::from(credentials.host()));
                properties.insert(PROP_PORT_NUMBER.to_string(), Value::from(credentials.port()));
                properties.insert(
                    PROP_DATABASE_NAME.to_string(),
                    Value::from(credentials.database()),
                );
                properties.insert(PROP_USER.to_string(), Value::from(credentials.username()));
                properties.insert(
                    PROP_PASSWORD.to_string(),
                    Value::from(credentials.password()),
                );
                PoolSource::DataSource {
                    class_id: class_id.to_string(),
                    properties,
                }
            }
        };

        Ok(Self {
            pool_name: pool_name.into(),
            engine,
            source,
            max_pool_size: options.max_pool_size_or_default(),
            min_idle: options.min_idle_or_default(),
            acquire_timeout: Duration::from_secs(options.acquire_timeout_or_default()),
            idle_timeout: Duration::from_secs(options.idle_timeout_or_default()),
            test_before_acquire: options.test_before_acquire_or_default(),
        })
    }

    /// Connection URL, set only in URL-mode.
    pub fn jdbc_url(&self) -> Option<&str> {
        match &self.source {
            PoolSource::Url { jdbc_url, .. } => Some(jdbc_url),
            PoolSource::DataSource { .. } => None,
        }
    }

    /// Data-source class, set only in DataSource-mode.
    pub fn datasource_class_id(&self) -> Option<&str> {
        match &self.source {
            PoolSource::Url { .. } => None,
            PoolSource::DataSource { class_id, .. } => Some(class_id),
        }
    }

    pub fn datasource_property(&self, key: &str) -> Option<&Value> {
        match &self.source {
            PoolSource::Url { .. } => None,
            PoolSource::DataSource { properties, .. } => properties.get(key),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self.source {
            PoolSource::Url { .. } => "url",
            PoolSource::DataSource { .. } => "datasource",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(engine: Engine) -> Credentials {
        Credentials::builder()
            .engine(engine)
            .host("db.local")
            .port(6000)
            .database("mat")
            .username("postgres")
            .password("x")
            .build()
            .unwrap()
    }

    #[test]
    fn test_postgresql_uses_datasource_mode() {
        let config = PoolConfig::assemble(
            "POSTGRESQL_mat",
            &credentials(Engine::PostgreSQL),
            &PoolOptions::default(),
        )
        .unwrap();

        assert_eq!(config.mode(), "datasource");
        assert!(config.jdbc_url().is_none());
        assert_eq!(
            config.datasource_class_id(),
            Some("org.postgresql.ds.PGSimpleDataSource")
        );

        let PoolSource::DataSource { properties, .. } = &config.source else {
            panic!("expected DataSource-mode");
        };
        let keys: Vec<_> = properties.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["databaseName", "password", "portNumber", "serverName", "user"]
        );
        assert_eq!(properties["serverName"], "db.local");
        assert_eq!(properties["portNumber"], 6000);
        assert_eq!(properties["databaseName"], "mat");
        assert_eq!(properties["user"], "postgres");
        assert_eq!(properties["password"], "x");
    }

    #[test]
    fn test_mysql_uses_url_mode() {
        let config = PoolConfig::assemble(
            "MYSQL_mat",
            &credentials(Engine::MySQL),
            &PoolOptions::default(),
        )
        .unwrap();

        assert_eq!(config.mode(), "url");
        assert!(config.datasource_class_id().is_none());
        assert!(config.datasource_property(PROP_SERVER_NAME).is_none());
        assert_eq!(
            config.source,
            PoolSource::Url {
                jdbc_url: "jdbc:mysql://db.local:6000/mat".to_string(),
                username: "postgres".to_string(),
                password: "x".to_string(),
            }
        );
    }

    #[test]
    fn test_oracle_and_sqlserver_use_datasource_mode() {
        for engine in [Engine::Oracle, Engine::SQLServer] {
            let config =
                PoolConfig::assemble("k", &credentials(engine), &PoolOptions::default()).unwrap();
            assert_eq!(config.datasource_class_id(), engine.native_datasource_id());
            assert!(config.jdbc_url().is_none());
        }
    }

    #[test]
    fn test_default_sizing_policy() {
        let config = PoolConfig::assemble(
            "k",
            &credentials(Engine::PostgreSQL),
            &PoolOptions::default(),
        )
        .unwrap();
        assert_eq!(config.max_pool_size, 1);
        assert_eq!(config.min_idle, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert!(config.test_before_acquire);
    }

    #[test]
    fn test_invalid_options_are_configuration_errors() {
        let options = PoolOptions {
            max_pool_size: Some(0),
            ..Default::default()
        };
        let err = PoolConfig::assemble("k", &credentials(Engine::MySQL), &options).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_debug_masks_password() {
        for engine in [Engine::PostgreSQL, Engine::MySQL] {
            let creds = credentials(engine)
                .to_builder()
                .password("hunter2")
                .build()
                .unwrap();
            let config = PoolConfig::assemble("k", &creds, &PoolOptions::default()).unwrap();
            assert!(!format!("{:?}", config).contains("hunter2"));
        }
    }
}

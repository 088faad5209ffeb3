//! Database credentials.
//!
//! [`Credentials`] is an immutable description of one target database and
//! its login. It can only be obtained through [`CredentialsBuilder`], which
//! enforces the required fields and derives the connection URL once.

use crate::error::{DbError, DbResult};
use crate::models::Engine;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;

/// Connection target and login for one database.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    engine: Engine,
    host: String,
    port: u16,
    database: String,
    username: String,
    /// Contains sensitive data - never log
    password: String,
    connection_url: String,
}

impl Credentials {
    pub fn builder() -> CredentialsBuilder {
        CredentialsBuilder::new()
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// URL derived from engine, host, port and database at build time.
    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    /// Start a builder pre-filled with these values.
    pub fn to_builder(&self) -> CredentialsBuilder {
        CredentialsBuilder {
            engine: Some(self.engine),
            host: self.host.clone(),
            port: self.port,
            database: Some(self.database.clone()),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"****")
            .field("connection_url", &self.connection_url)
            .finish()
    }
}

/// Builder for [`Credentials`].
///
/// Starts with host `localhost` and port `5432`. Engine and database are
/// required; username and password default to empty strings.
#[derive(Clone)]
pub struct CredentialsBuilder {
    engine: Option<Engine>,
    host: String,
    port: u16,
    database: Option<String>,
    username: String,
    password: String,
}

impl CredentialsBuilder {
    pub fn new() -> Self {
        Self {
            engine: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: None,
            username: String::new(),
            password: String::new(),
        }
    }

    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Build the credentials.
    ///
    /// Fails with a configuration error when the engine or the database name
    /// is missing.
    pub fn build(self) -> DbResult<Credentials> {
        let engine = self
            .engine
            .ok_or_else(|| DbError::configuration("database engine is required"))?;
        let database = self
            .database
            .ok_or_else(|| DbError::configuration("database name is required"))?;

        let connection_url = engine.assemble_url(&self.host, self.port, &database);

        Ok(Credentials {
            engine,
            host: self.host,
            port: self.port,
            database,
            username: self.username,
            password: self.password,
            connection_url,
        })
    }
}

impl Default for CredentialsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsBuilder")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

//! Supported database engines.
//!
//! Each engine knows its JDBC-style URL grammar and, when the driver prefers
//! it, the data-source class used to configure pools from discrete
//! properties instead of a URL.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database engines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Engine {
    #[value(name = "postgresql")]
    PostgreSQL,
    /// Includes MariaDB
    #[value(name = "mysql")]
    MySQL,
    #[value(name = "oracle")]
    Oracle,
    #[value(name = "sqlserver")]
    SQLServer,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::PostgreSQL,
        Engine::MySQL,
        Engine::Oracle,
        Engine::SQLServer,
    ];

    /// Stable identifier used in registry keys.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "POSTGRESQL",
            Self::MySQL => "MYSQL",
            Self::Oracle => "ORACLE",
            Self::SQLServer => "SQLSERVER",
        }
    }

    pub fn url_prefix(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "jdbc:postgresql://",
            Self::MySQL => "jdbc:mysql://",
            Self::Oracle => "jdbc:oracle:thin:@",
            Self::SQLServer => "jdbc:sqlserver://",
        }
    }

    /// Data-source class the driver provides for property-based configuration.
    ///
    /// `None` means pools for this engine are configured from the URL.
    pub fn native_datasource_id(&self) -> Option<&'static str> {
        match self {
            Self::PostgreSQL => Some("org.postgresql.ds.PGSimpleDataSource"),
            Self::MySQL => None,
            Self::Oracle => Some("oracle.jdbc.pool.OracleDataSource"),
            Self::SQLServer => Some("com.microsoft.sqlserver.jdbc.SQLServerDataSource"),
        }
    }

    /// Build the connection URL for this engine.
    ///
    /// Host and database are inserted verbatim. Names containing `;`, `/` or
    /// whitespace produce URLs the driver will reject.
    pub fn assemble_url(&self, host: &str, port: u16, database: &str) -> String {
        match self {
            Self::PostgreSQL | Self::MySQL => {
                format!("{}{}:{}/{}", self.url_prefix(), host, port, database)
            }
            Self::Oracle => format!("{}//{}:{}/{}", self.url_prefix(), host, port, database),
            Self::SQLServer => format!(
                "{}{}:{};databaseName={}",
                self.url_prefix(),
                host,
                port,
                database
            ),
        }
    }

    /// Get the display name for this engine.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::Oracle => "Oracle",
            Self::SQLServer => "SQL Server",
        }
    }

    /// The port the engine's server listens on out of the box.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::PostgreSQL => 5432,
            Self::MySQL => 3306,
            Self::Oracle => 1521,
            Self::SQLServer => 1433,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|engine| engine.variant_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown database engine: {}", s))
    }
}

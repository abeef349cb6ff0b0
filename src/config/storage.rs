//! Storage configuration types.

use std::fmt;

use serde::Deserialize;

/// Path value selecting a private in-memory SQLite database.
pub const SQLITE_IN_MEMORY: &str = ":memory:";

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Sqlite => f.write_str("sqlite"),
            StorageType::Postgres => f.write_str("postgres"),
        }
    }
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
}

impl StorageConfig {
    /// Configuration for an in-memory SQLite ledger.
    pub fn in_memory() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            sqlite: SqliteConfig::in_memory(),
            ..Default::default()
        }
    }
}

/// PostgreSQL-specific configuration.
///
/// Connection parameters are already resolved; nothing here is looked up
/// from a secret store.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before failing.
    pub acquire_timeout_secs: u64,
    /// Create the ledger table on connect.
    pub create_schema: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "rdc".to_string(),
            password: String::new(),
            database: "rawdata_client".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            create_schema: false,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("create_schema", &self.create_schema)
            .finish()
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
    /// Create the ledger table on connect.
    pub create_schema: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/positions.db".to_string(),
            max_connections: 5,
            create_schema: true,
        }
    }
}

impl SqliteConfig {
    /// In-memory database with the schema created on connect.
    pub fn in_memory() -> Self {
        Self {
            path: SQLITE_IN_MEMORY.to_string(),
            ..Default::default()
        }
    }

    /// File-backed database at `path`.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == SQLITE_IN_MEMORY
    }
}

//! Backend factory for interface tests.
//!
//! Provides a unified interface to create ledger backends based on environment configuration.

use std::env;
use std::sync::Arc;

use position_ledger::{MockPositionLedger, PositionLedger};

#[cfg(feature = "sqlite")]
use position_ledger::config::SqliteConfig;
#[cfg(feature = "sqlite")]
use position_ledger::storage::SqlitePositionLedger;

#[cfg(feature = "postgres")]
use position_ledger::config::PostgresConfig;
#[cfg(feature = "postgres")]
use position_ledger::storage::PostgresPositionLedger;
#[cfg(feature = "postgres")]
use std::time::Duration;
#[cfg(feature = "postgres")]
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};

/// Ledger backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Postgres,
    Mock,
}

impl StorageBackend {
    pub fn from_env() -> Self {
        match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "mock" => StorageBackend::Mock,
            _ => StorageBackend::Sqlite,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Postgres => "postgres",
            StorageBackend::Mock => "mock",
        }
    }
}

/// Container handles to keep containers alive during tests.
#[allow(dead_code)]
#[derive(Debug)]
pub enum ContainerHandle {
    None,
    #[cfg(feature = "postgres")]
    Postgres(testcontainers::ContainerAsync<GenericImage>),
}

/// Holds the ledger for a backend.
pub struct StorageContext {
    pub ledger: Arc<dyn PositionLedger>,
    /// Container handle to keep container alive.
    #[allow(dead_code)]
    container: ContainerHandle,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("ledger", &"<dyn PositionLedger>")
            .field("container", &self.container)
            .finish()
    }
}

impl StorageContext {
    /// Create a ledger context for the configured backend.
    ///
    /// Each context is a fresh, empty ledger.
    pub async fn new(backend: StorageBackend) -> Self {
        match backend {
            StorageBackend::Sqlite => Self::create_sqlite().await,
            StorageBackend::Postgres => Self::create_postgres().await,
            StorageBackend::Mock => StorageContext {
                ledger: Arc::new(MockPositionLedger::new()),
                container: ContainerHandle::None,
            },
        }
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite() -> Self {
        let ledger = SqlitePositionLedger::connect(&SqliteConfig::in_memory())
            .await
            .expect("Failed to open in-memory SQLite ledger");

        StorageContext {
            ledger: Arc::new(ledger),
            container: ContainerHandle::None,
        }
    }

    #[cfg(not(feature = "sqlite"))]
    async fn create_sqlite() -> Self {
        panic!("SQLite feature not enabled. Build with --features sqlite");
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres() -> Self {
        let image = GenericImage::new("postgres", "16")
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stdout(
                "database system is ready to accept connections",
            ));

        let container = image
            .with_env_var("POSTGRES_USER", "testuser")
            .with_env_var("POSTGRES_PASSWORD", "testpass")
            .with_env_var("POSTGRES_DB", "testdb")
            .with_startup_timeout(Duration::from_secs(60))
            .start()
            .await
            .expect("Failed to start Postgres container");

        // Brief delay for full readiness
        tokio::time::sleep(Duration::from_secs(2)).await;

        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let host = container.get_host().await.expect("Failed to get host");

        let config = PostgresConfig {
            host: host.to_string(),
            port,
            user: "testuser".to_string(),
            password: "testpass".to_string(),
            database: "testdb".to_string(),
            max_connections: 5,
            create_schema: true,
            ..Default::default()
        };

        let ledger = PostgresPositionLedger::connect(&config)
            .await
            .expect("Failed to connect to PostgreSQL");

        StorageContext {
            ledger: Arc::new(ledger),
            container: ContainerHandle::Postgres(container),
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn create_postgres() -> Self {
        panic!("PostgreSQL feature not enabled. Build with --features postgres");
    }
}

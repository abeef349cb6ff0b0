//! Storage implementations.
//!
//! This module provides:
//! - SQL ledgers (PostgreSQL, SQLite) built on a shared transaction layer
//! - An in-memory mock for tests
//! - [`init_ledger`] to build the configured backend

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::{PersistenceError, PositionLedger, Result};

pub mod mock;
pub mod schema;
pub mod sql;

pub use mock::MockPositionLedger;
pub use sql::{SqlPositionLedger, Transaction, TransactionFactory, TransactionStatistics};

#[cfg(feature = "postgres")]
pub use sql::postgres::{PostgresPositionLedger, PostgresTransactionFactory};

#[cfg(feature = "sqlite")]
pub use sql::sqlite::{SqlitePositionLedger, SqliteTransactionFactory};

/// Initialize the ledger based on configuration.
///
/// Fails with [`PersistenceError::UnsupportedBackend`] when the configured
/// storage type was not compiled in.
pub async fn init_ledger(config: &StorageConfig) -> Result<Arc<dyn PositionLedger>> {
    info!(storage_type = %config.storage_type, "Initializing position ledger");

    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let ledger = SqlitePositionLedger::connect(&config.sqlite).await?;
            Ok(Arc::new(ledger))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            let ledger = PostgresPositionLedger::connect(&config.postgres).await?;
            Ok(Arc::new(ledger))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(storage_type = %other, "Storage backend requested but its feature is not enabled");
            Err(PersistenceError::UnsupportedBackend(other.to_string()))
        }
    }
}

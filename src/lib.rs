//! Position Ledger
//!
//! A durable, ordered ledger of completed ingestion positions. Positions are
//! opaque cursor tokens grouped into independent namespaces; within a
//! namespace the store-assigned sequence is the only ordering authority.
//!
//! Every ledger operation runs on a worker task in its own transaction, so a
//! batch is visible all-or-nothing and no connection is held between calls.
//!
//! Backends are selected at compile time:
//! - `sqlite` (default via `standalone`): file-backed or in-memory SQLite
//! - `postgres` (via `server`): shared PostgreSQL database

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one storage backend feature: `postgres` or `sqlite`");

pub mod config;
pub mod interfaces;
pub mod storage;
pub mod utils;

pub use config::{LedgerConfig, StorageConfig, StorageType};
pub use interfaces::{CompletedPosition, PersistenceError, PositionLedger, PositionStream};
pub use storage::{init_ledger, MockPositionLedger, SqlPositionLedger};

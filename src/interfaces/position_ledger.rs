//! Position ledger interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Lazy, single-pass stream of completed positions in ascending sequence order.
pub type PositionStream = BoxStream<'static, Result<CompletedPosition>>;

/// Errors that can occur while talking to the backing store.
///
/// Absent data is never an error: queries with no match return `None` or an
/// empty stream.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to acquire transaction: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("Statement failed: {0}")]
    Statement(#[source] sqlx::Error),

    #[error("Commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("Rollback failed: {0}")]
    Rollback(#[source] sqlx::Error),

    #[error("Failed to connect to {backend}: {source}")]
    Connect {
        backend: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Ledger worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Storage backend '{0}' is not enabled in this build")]
    UnsupportedBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistenceError {
    /// The underlying driver error, if any.
    pub fn sqlx_error(&self) -> Option<&sqlx::Error> {
        match self {
            PersistenceError::Acquire(e)
            | PersistenceError::Statement(e)
            | PersistenceError::Commit(e)
            | PersistenceError::Rollback(e)
            | PersistenceError::Connect { source: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Whether re-running the whole unit of work on a fresh transaction may succeed.
    ///
    /// Retryable:
    /// - pool timeouts and I/O failures
    /// - PostgreSQL `40001` (serialization failure) and `40P01` (deadlock)
    /// - SQLite `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6), including extended codes
    pub fn is_retryable(&self) -> bool {
        match self.sqlx_error() {
            Some(sqlx::Error::PoolTimedOut) | Some(sqlx::Error::Io(_)) => true,
            Some(sqlx::Error::Database(db)) => match db.code() {
                Some(code) => is_transient_code(&code),
                None => false,
            },
            _ => false,
        }
    }
}

fn is_transient_code(code: &str) -> bool {
    match code {
        "40001" | "40P01" => true,
        other => other
            .parse::<i32>()
            .map(|c| matches!(c & 0xff, 5 | 6))
            .unwrap_or(false),
    }
}

/// A position recorded as completed within a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPosition {
    pub namespace: String,
    pub opaque_id: String,
    /// Store-assigned ordering key, strictly increasing within a namespace.
    pub sequence: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Durable, ordered ledger of completed positions.
///
/// Each namespace is an independent stream ordered solely by the
/// store-assigned sequence. Every operation runs in its own transaction;
/// no connection is held between calls.
///
/// # Implementations
///
/// - `PostgresPositionLedger`: PostgreSQL storage
/// - `SqlitePositionLedger`: SQLite storage
/// - `MockPositionLedger`: In-memory mock for testing
#[async_trait]
pub trait PositionLedger: Send + Sync {
    /// Append `positions` to `namespace` in the given order, atomically.
    ///
    /// Returns `Ok(false)` if the store reports a different number of
    /// inserted rows than requested; nothing is persisted in that case.
    async fn track_completed_positions(&self, namespace: &str, positions: &[String])
        -> Result<bool>;

    /// The position with the smallest sequence in `namespace`.
    async fn get_first_position(&self, namespace: &str) -> Result<Option<String>>;

    /// The position with the largest sequence in `namespace`.
    async fn get_last_position(&self, namespace: &str) -> Result<Option<String>>;

    /// The position `offset` steps after `from_position`.
    ///
    /// When fewer than `offset` positions follow, the furthest one is
    /// returned. `None` if nothing follows, `offset` is zero, or
    /// `from_position` is not in `namespace`.
    async fn get_offset_position(
        &self,
        namespace: &str,
        from_position: &str,
        offset: u32,
    ) -> Result<Option<String>>;

    /// All positions from `from_position` to `to_position`, both inclusive.
    ///
    /// The range is loaded in one transaction when the stream is first
    /// polled. Empty if either endpoint is unknown or `from` follows `to`.
    fn read_positions(
        &self,
        namespace: &str,
        from_position: &str,
        to_position: &str,
    ) -> PositionStream;

    /// Release all pooled resources. Idempotent.
    async fn close(&self) -> Result<()>;
}

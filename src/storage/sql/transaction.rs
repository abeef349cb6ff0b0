//! Transactions and the factory that hands them out.
//!
//! A [`Transaction`] owns one pooled connection for its whole lifetime.
//! `commit` and `cancel` consume it, so at most one of them can run, and the
//! connection goes back to the pool on every exit path: after a successful
//! finalize, after a failed one, and when the transaction is dropped
//! (sqlx rolls back on drop).

use std::future::Future;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use sqlx::Pool;
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use super::SqlDatabase;
use crate::interfaces::{PersistenceError, Result};

/// Execution statistics reported when a transaction is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionStatistics {
    /// Statements executed through this transaction.
    pub statements: u64,
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Rows returned by queries.
    pub rows_returned: u64,
    /// Time from begin to finalize.
    pub elapsed: Duration,
    /// True if the transaction was committed, false if it was cancelled.
    pub committed: bool,
}

/// One unit of work bound to one pooled connection.
pub struct Transaction<DB: SqlDatabase> {
    inner: sqlx::Transaction<'static, DB::Db>,
    read_only: bool,
    statistics: TransactionStatistics,
    started: Instant,
    span: Span,
}

impl<DB: SqlDatabase> Transaction<DB> {
    fn new(inner: sqlx::Transaction<'static, DB::Db>, read_only: bool) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("transaction", %id, read_only, backend = DB::NAME);
        debug!(parent: &span, "Transaction started");

        Self {
            inner,
            read_only,
            statistics: TransactionStatistics::default(),
            started: Instant::now(),
            span,
        }
    }

    /// Whether this transaction was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Statistics accumulated so far.
    pub fn statistics(&self) -> &TransactionStatistics {
        &self.statistics
    }

    /// The connection to execute statements on.
    pub fn connection(&mut self) -> &mut <DB::Db as sqlx::Database>::Connection {
        &mut *self.inner
    }

    /// Count one executed statement.
    pub fn record_statement(&mut self, rows_affected: u64, rows_returned: u64) {
        self.statistics.statements += 1;
        self.statistics.rows_affected += rows_affected;
        self.statistics.rows_returned += rows_returned;
    }

    /// Make all writes durable and release the connection.
    pub async fn commit(self) -> Result<TransactionStatistics> {
        let Transaction {
            inner,
            mut statistics,
            started,
            span,
            ..
        } = self;

        let result = inner.commit().await;
        statistics.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                statistics.committed = true;
                debug!(
                    parent: &span,
                    statements = statistics.statements,
                    rows_affected = statistics.rows_affected,
                    rows_returned = statistics.rows_returned,
                    elapsed_ms = statistics.elapsed.as_millis() as u64,
                    "Transaction committed"
                );
                Ok(statistics)
            }
            Err(e) => {
                warn!(parent: &span, error = %e, "Transaction commit failed");
                Err(PersistenceError::Commit(e))
            }
        }
    }

    /// Discard all writes and release the connection.
    pub async fn cancel(self) -> Result<TransactionStatistics> {
        let Transaction {
            inner,
            mut statistics,
            started,
            span,
            ..
        } = self;

        let result = inner.rollback().await;
        statistics.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                debug!(
                    parent: &span,
                    statements = statistics.statements,
                    elapsed_ms = statistics.elapsed.as_millis() as u64,
                    "Transaction cancelled"
                );
                Ok(statistics)
            }
            Err(e) => {
                warn!(parent: &span, error = %e, "Transaction rollback failed");
                Err(PersistenceError::Rollback(e))
            }
        }
    }

    /// Commit on `Ok`, cancel on `Err`, then hand the outcome back.
    ///
    /// A rollback failure is logged; the original error is returned.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.cancel().await {
                    warn!(error = %rollback, cause = %e, "Rollback after failed unit of work also failed");
                }
                Err(e)
            }
        }
    }
}

/// Creates transactions against a connection pool.
pub struct TransactionFactory<DB: SqlDatabase> {
    pool: Pool<DB::Db>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> Clone for TransactionFactory<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}

impl<DB: SqlDatabase> TransactionFactory<DB> {
    /// Create a factory over an existing pool.
    pub fn new(pool: Pool<DB::Db>) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &Pool<DB::Db> {
        &self.pool
    }

    /// Acquire a connection and begin an explicit transaction on it.
    ///
    /// Statements executed through the returned transaction are grouped into
    /// one unit of work until `commit` or `cancel`.
    pub async fn create_transaction(&self, read_only: bool) -> Result<Transaction<DB>> {
        let mut inner = self.pool.begin().await.map_err(PersistenceError::Acquire)?;

        if read_only {
            DB::restrict_read_only(&mut inner)
                .await
                .map_err(PersistenceError::Acquire)?;
        }

        Ok(Transaction::new(inner, read_only))
    }

    /// Close the pool, waiting for checked-out connections to come back.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            info!(backend = DB::NAME, "Closing position ledger pool");
        }
        self.pool.close().await;
    }
}

/// Macro to implement `run_isolated` for a specific SQL backend.
///
/// The worker future is spawned onto the runtime, which needs the concrete
/// driver type to prove it `Send`.
macro_rules! impl_run_isolated {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl TransactionFactory<$db_type> {
            /// Run `work` on a worker task with a fresh transaction.
            ///
            /// `work` owns the transaction and must commit or cancel it; the
            /// factory never does either, and never retries.
            pub fn run_isolated<T, F, Fut>(
                &self,
                read_only: bool,
                work: F,
            ) -> impl Future<Output = Result<T>> + Send + 'static
            where
                F: FnOnce(Transaction<$db_type>) -> Fut + Send + 'static,
                Fut: Future<Output = Result<T>> + Send + 'static,
                T: Send + 'static,
            {
                let factory = self.clone();
                let handle = tokio::spawn(async move {
                    let tx = factory.create_transaction(read_only).await?;
                    work(tx).await
                });

                async move { handle.await? }
            }
        }
    };
}

impl_run_isolated!(super::postgres::Postgres, "postgres");
impl_run_isolated!(super::sqlite::Sqlite, "sqlite");

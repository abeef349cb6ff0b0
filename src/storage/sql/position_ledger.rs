//! Unified SQL PositionLedger implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use tracing::info;

use super::{SqlDatabase, TransactionFactory};
use crate::interfaces::{PersistenceError, Result};

/// SQL-based implementation of PositionLedger.
///
/// Every operation runs on a worker task spawned by the transaction factory,
/// inside its own transaction: writes on a read-write transaction that is
/// committed, reads on a read-only one. Nothing is held open between calls.
pub struct SqlPositionLedger<DB: SqlDatabase> {
    factory: TransactionFactory<DB>,
}

impl<DB: SqlDatabase> SqlPositionLedger<DB> {
    /// Create a new SQL position ledger with the given pool.
    pub fn new(pool: sqlx::Pool<DB::Db>) -> Self {
        Self {
            factory: TransactionFactory::new(pool),
        }
    }

    /// Get the transaction factory.
    pub fn factory(&self) -> &TransactionFactory<DB> {
        &self.factory
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &sqlx::Pool<DB::Db> {
        self.factory.pool()
    }
}

/// Macro to implement PositionLedger for a specific SQL backend.
///
/// This eliminates duplication between PostgreSQL and SQLite implementations
/// while maintaining full type safety.
macro_rules! impl_position_ledger {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlPositionLedger<$db_type> {
            /// Create the ledger table and indexes if they do not exist.
            pub async fn ensure_schema(&self) -> Result<()> {
                sqlx::raw_sql(<$db_type as SqlDatabase>::SCHEMA)
                    .execute(self.factory.pool())
                    .await
                    .map_err(PersistenceError::Statement)?;

                tracing::debug!(
                    backend = <$db_type as SqlDatabase>::NAME,
                    "Position ledger schema ready"
                );
                Ok(())
            }

            /// Insert `positions` in chunks, returning the total rows inserted.
            async fn insert_batch(
                tx: &mut super::Transaction<$db_type>,
                namespace: &str,
                positions: &[String],
            ) -> Result<u64> {
                let mut inserted = 0;

                for chunk in positions.chunks(super::INSERT_CHUNK_SIZE) {
                    let (sql, values) = <$db_type as SqlDatabase>::build(
                        &super::query::insert_positions(namespace, chunk),
                    );

                    let result = sqlx::query_with(&sql, values)
                        .execute(tx.connection())
                        .await
                        .map_err(PersistenceError::Statement)?;

                    tx.record_statement(result.rows_affected(), 0);
                    inserted += result.rows_affected();
                }

                Ok(inserted)
            }

            /// Fetch a single opaque id.
            async fn fetch_position(
                tx: &mut super::Transaction<$db_type>,
                sql: String,
                values: sea_query_binder::SqlxValues,
            ) -> Result<Option<String>> {
                use sqlx::Row;

                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(tx.connection())
                    .await
                    .map_err(PersistenceError::Statement)?;

                tx.record_statement(0, row.is_some() as u64);

                row.map(|row| row.try_get::<String, _>("opaque_id"))
                    .transpose()
                    .map_err(PersistenceError::Statement)
            }

            /// The last of up to `offset` positions following the anchor.
            async fn fetch_offset(
                tx: &mut super::Transaction<$db_type>,
                namespace: &str,
                from_position: &str,
                offset: u32,
            ) -> Result<Option<String>> {
                use sqlx::Row;

                let (sql, values) = <$db_type as SqlDatabase>::build(
                    &super::query::select_following(namespace, from_position, offset),
                );
                let rows = sqlx::query_with(&sql, values)
                    .fetch_all(tx.connection())
                    .await
                    .map_err(PersistenceError::Statement)?;

                tx.record_statement(0, rows.len() as u64);

                rows.last()
                    .map(|row| row.try_get::<String, _>("opaque_id"))
                    .transpose()
                    .map_err(PersistenceError::Statement)
            }

            /// Materialize the inclusive range between the two anchors.
            async fn fetch_range(
                tx: &mut super::Transaction<$db_type>,
                namespace: &str,
                from_position: &str,
                to_position: &str,
            ) -> Result<Vec<crate::interfaces::CompletedPosition>> {
                use sqlx::Row;

                let (sql, values) = <$db_type as SqlDatabase>::build(
                    &super::query::select_range(namespace, from_position, to_position),
                );
                let rows = sqlx::query_with(&sql, values)
                    .fetch_all(tx.connection())
                    .await
                    .map_err(PersistenceError::Statement)?;

                tx.record_statement(0, rows.len() as u64);

                let mut positions = Vec::with_capacity(rows.len());
                for row in rows {
                    positions.push(crate::interfaces::CompletedPosition {
                        namespace: row.try_get("namespace").map_err(PersistenceError::Statement)?,
                        opaque_id: row.try_get("opaque_id").map_err(PersistenceError::Statement)?,
                        sequence: row.try_get("id").map_err(PersistenceError::Statement)?,
                        recorded_at: row
                            .try_get("recorded_at")
                            .map_err(PersistenceError::Statement)?,
                    });
                }

                Ok(positions)
            }

            async fn edge_position(
                &self,
                namespace: &str,
                order: sea_query::Order,
            ) -> Result<Option<String>> {
                let (sql, values) =
                    <$db_type as SqlDatabase>::build(&super::query::select_edge(namespace, order));

                self.factory
                    .run_isolated(true, move |mut tx| async move {
                        let outcome = Self::fetch_position(&mut tx, sql, values).await;
                        tx.finish(outcome).await
                    })
                    .await
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::PositionLedger for SqlPositionLedger<$db_type> {
            async fn track_completed_positions(
                &self,
                namespace: &str,
                positions: &[String],
            ) -> Result<bool> {
                if positions.is_empty() {
                    tracing::debug!(namespace = %namespace, "No positions to track");
                    return Ok(true);
                }

                let namespace = namespace.to_owned();
                let positions = positions.to_vec();

                self.factory
                    .run_isolated(false, move |mut tx| async move {
                        let requested = positions.len() as u64;

                        match Self::insert_batch(&mut tx, &namespace, &positions).await {
                            Ok(inserted) if inserted == requested => {
                                tx.commit().await?;
                                tracing::debug!(
                                    namespace = %namespace,
                                    count = requested,
                                    "Tracked completed positions"
                                );
                                Ok(true)
                            }
                            Ok(inserted) => {
                                tracing::warn!(
                                    namespace = %namespace,
                                    requested,
                                    inserted,
                                    "Inserted row count does not match requested positions, rolling back"
                                );
                                tx.cancel().await?;
                                Ok(false)
                            }
                            Err(e) => tx.finish(Err(e)).await,
                        }
                    })
                    .await
            }

            async fn get_first_position(&self, namespace: &str) -> Result<Option<String>> {
                self.edge_position(namespace, sea_query::Order::Asc).await
            }

            async fn get_last_position(&self, namespace: &str) -> Result<Option<String>> {
                self.edge_position(namespace, sea_query::Order::Desc).await
            }

            async fn get_offset_position(
                &self,
                namespace: &str,
                from_position: &str,
                offset: u32,
            ) -> Result<Option<String>> {
                if offset == 0 {
                    return Ok(None);
                }

                let namespace = namespace.to_owned();
                let from_position = from_position.to_owned();

                self.factory
                    .run_isolated(true, move |mut tx| async move {
                        let outcome =
                            Self::fetch_offset(&mut tx, &namespace, &from_position, offset).await;
                        tx.finish(outcome).await
                    })
                    .await
            }

            fn read_positions(
                &self,
                namespace: &str,
                from_position: &str,
                to_position: &str,
            ) -> crate::interfaces::PositionStream {
                use futures::{future, stream, StreamExt};

                let factory = self.factory.clone();
                let namespace = namespace.to_owned();
                let from_position = from_position.to_owned();
                let to_position = to_position.to_owned();

                stream::once(async move {
                    factory
                        .run_isolated(true, move |mut tx| async move {
                            let outcome =
                                Self::fetch_range(&mut tx, &namespace, &from_position, &to_position)
                                    .await;
                            tx.finish(outcome).await
                        })
                        .await
                })
                .flat_map(|loaded| match loaded {
                    Ok(positions) => stream::iter(positions.into_iter().map(Ok)).left_stream(),
                    Err(e) => stream::once(future::ready(Err(e))).right_stream(),
                })
                .boxed()
            }

            async fn close(&self) -> Result<()> {
                self.factory.close().await;
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_position_ledger!(super::postgres::Postgres, "postgres");
impl_position_ledger!(super::sqlite::Sqlite, "sqlite");

#[cfg(feature = "postgres")]
impl SqlPositionLedger<super::postgres::Postgres> {
    /// Connect to PostgreSQL with already-resolved connection parameters.
    pub async fn connect(config: &crate::config::PostgresConfig) -> Result<Self> {
        use std::time::Duration;

        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|source| PersistenceError::Connect {
                backend: "postgres",
                source,
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "Connected to PostgreSQL position ledger"
        );

        let ledger = Self::new(pool);
        if config.create_schema {
            ledger.ensure_schema().await?;
        }
        Ok(ledger)
    }
}

#[cfg(feature = "sqlite")]
impl SqlPositionLedger<super::sqlite::Sqlite> {
    /// Open (creating if needed) a SQLite ledger database.
    ///
    /// `:memory:` gives a private in-memory database shared by the pool's
    /// connections for as long as the pool lives.
    pub async fn connect(config: &crate::config::SqliteConfig) -> Result<Self> {
        use std::str::FromStr;

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

        let connect_error = |source| PersistenceError::Connect {
            backend: "sqlite",
            source,
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);

        let options = if config.is_in_memory() {
            // The database disappears with its last connection.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(connect_error)?
        } else {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(connect_error)?;

        info!(path = %config.path, "Opened SQLite position ledger");

        let ledger = Self::new(pool);
        if config.create_schema {
            ledger.ensure_schema().await?;
        }
        Ok(ledger)
    }
}

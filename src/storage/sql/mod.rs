//! Unified SQL ledger implementation.
//!
//! This module provides the transaction layer and the ledger for SQL
//! backends (PostgreSQL, SQLite). Both are parameterized by database type
//! using the `SqlDatabase` trait.

mod position_ledger;
mod query;
mod transaction;

pub use position_ledger::SqlPositionLedger;
pub use query::{SqlDatabase, INSERT_CHUNK_SIZE};
pub use transaction::{Transaction, TransactionFactory, TransactionStatistics};

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sea_query::PostgresQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};

    use crate::storage::schema::CREATE_POSITIONS_TABLE_POSTGRES;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Db = sqlx::Postgres;

        const NAME: &'static str = "postgres";

        const SCHEMA: &'static str = CREATE_POSITIONS_TABLE_POSTGRES;

        fn build<S: SqlxBinder>(stmt: &S) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn restrict_read_only<'a>(
            tx: &'a mut sqlx::Transaction<'static, sqlx::Postgres>,
        ) -> BoxFuture<'a, Result<(), sqlx::Error>> {
            async move {
                sqlx::query("SET TRANSACTION READ ONLY")
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            }
            .boxed()
        }
    }

    /// PostgreSQL transaction.
    pub type PostgresTransaction = super::Transaction<Postgres>;

    /// PostgreSQL transaction factory.
    pub type PostgresTransactionFactory = super::TransactionFactory<Postgres>;

    /// PostgreSQL position ledger.
    pub type PostgresPositionLedger = super::SqlPositionLedger<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sea_query::SqliteQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};

    use crate::storage::schema::CREATE_POSITIONS_TABLE_SQLITE;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Db = sqlx::Sqlite;

        const NAME: &'static str = "sqlite";

        const SCHEMA: &'static str = CREATE_POSITIONS_TABLE_SQLITE;

        fn build<S: SqlxBinder>(stmt: &S) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        // SQLite has no per-transaction access mode; writers serialize on
        // the database lock.
        fn restrict_read_only<'a>(
            _tx: &'a mut sqlx::Transaction<'static, sqlx::Sqlite>,
        ) -> BoxFuture<'a, Result<(), sqlx::Error>> {
            futures::future::ready(Ok(())).boxed()
        }
    }

    /// SQLite transaction.
    pub type SqliteTransaction = super::Transaction<Sqlite>;

    /// SQLite transaction factory.
    pub type SqliteTransactionFactory = super::TransactionFactory<Sqlite>;

    /// SQLite position ledger.
    pub type SqlitePositionLedger = super::SqlPositionLedger<Sqlite>;
}

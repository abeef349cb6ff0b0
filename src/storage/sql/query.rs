//! SQL database abstraction trait and shared ledger statements.

use futures::future::BoxFuture;
use sea_query::{
    Expr, InsertStatement, Order, Query, SelectStatement, SimpleExpr, SubQueryStatement,
};

use crate::storage::schema::CompletedPositions;

/// Maximum rows per multi-row `INSERT`.
///
/// Larger batches are split into several statements inside the same
/// transaction; PostgreSQL caps a statement at 65535 bind parameters.
pub const INSERT_CHUNK_SIZE: usize = 1000;

/// Trait for SQL database backends.
///
/// This trait abstracts over different SQL databases (PostgreSQL, SQLite)
/// by providing the sqlx driver type, the statement builder and the
/// backend-specific session setup.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The sqlx driver for this database.
    type Db: sqlx::Database;

    /// Short backend name used in logs and errors.
    const NAME: &'static str;

    /// Idempotent DDL creating the ledger table and indexes.
    const SCHEMA: &'static str;

    /// Build parameterized SQL and its bound values from a sea-query statement.
    fn build<S: sea_query_binder::SqlxBinder>(stmt: &S) -> (String, sea_query_binder::SqlxValues);

    /// Restrict a freshly begun transaction to reads.
    ///
    /// Backends without per-transaction access modes treat this as a no-op.
    fn restrict_read_only<'a>(
        tx: &'a mut sqlx::Transaction<'static, Self::Db>,
    ) -> BoxFuture<'a, Result<(), sqlx::Error>>;
}

/// Sequence of the most recent occurrence of `opaque_id` in `namespace`.
///
/// Yields SQL `NULL` when the position is unknown, which makes any
/// comparison against it false.
pub fn anchor(namespace: &str, opaque_id: &str) -> SimpleExpr {
    let stmt = Query::select()
        .expr(Expr::col(CompletedPositions::Id).max())
        .from(CompletedPositions::Table)
        .and_where(Expr::col(CompletedPositions::Namespace).eq(namespace))
        .and_where(Expr::col(CompletedPositions::OpaqueId).eq(opaque_id))
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(stmt)))
}

/// Multi-row insert of `positions` into `namespace`, preserving order.
///
/// `id` and `recorded_at` are assigned by the store.
pub fn insert_positions(namespace: &str, positions: &[String]) -> InsertStatement {
    let mut stmt = Query::insert();
    stmt.into_table(CompletedPositions::Table).columns([
        CompletedPositions::Namespace,
        CompletedPositions::OpaqueId,
    ]);

    for position in positions {
        stmt.values_panic([namespace.into(), position.as_str().into()]);
    }

    stmt
}

/// Position at one end of `namespace`.
pub fn select_edge(namespace: &str, order: Order) -> SelectStatement {
    Query::select()
        .column(CompletedPositions::OpaqueId)
        .from(CompletedPositions::Table)
        .and_where(Expr::col(CompletedPositions::Namespace).eq(namespace))
        .order_by(CompletedPositions::Id, order)
        .limit(1)
        .to_owned()
}

/// Up to `offset` positions following `from_position`, ascending.
pub fn select_following(namespace: &str, from_position: &str, offset: u32) -> SelectStatement {
    Query::select()
        .columns([CompletedPositions::Id, CompletedPositions::OpaqueId])
        .from(CompletedPositions::Table)
        .and_where(Expr::col(CompletedPositions::Namespace).eq(namespace))
        .and_where(Expr::col(CompletedPositions::Id).gt(anchor(namespace, from_position)))
        .order_by(CompletedPositions::Id, Order::Asc)
        .limit(u64::from(offset))
        .to_owned()
}

/// All positions between the two anchors, inclusive, ascending.
pub fn select_range(namespace: &str, from_position: &str, to_position: &str) -> SelectStatement {
    Query::select()
        .columns([
            CompletedPositions::Id,
            CompletedPositions::Namespace,
            CompletedPositions::OpaqueId,
            CompletedPositions::RecordedAt,
        ])
        .from(CompletedPositions::Table)
        .and_where(Expr::col(CompletedPositions::Namespace).eq(namespace))
        .and_where(Expr::col(CompletedPositions::Id).gte(anchor(namespace, from_position)))
        .and_where(Expr::col(CompletedPositions::Id).lte(anchor(namespace, to_position)))
        .order_by(CompletedPositions::Id, Order::Asc)
        .to_owned()
}

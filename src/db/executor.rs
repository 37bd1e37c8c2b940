//! Statement execution against a single connection.
//!
//! Pagination only needs two things from a connection: run a scalar count and
//! fetch a bounded list of rows. Those are captured by two capability traits,
//! one per calling convention:
//!
//! - [`Execute`]: non-blocking, implemented by `PgConnection` and pooled connections
//! - [`BlockingExecute`]: blocking, implemented by [`blocking::Connection`]
//!
//! Queries arrive already compiled to positional form, so implementors only
//! bind and run.
//!
//! [`blocking::Connection`]: crate::db::blocking::Connection

use crate::db::params::CompiledQuery;
use crate::db::types::row_values;
use crate::models::Row;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgConnection;
use sqlx::Postgres;
use std::future::Future;
use tracing::debug;

/// Non-blocking statement execution.
pub trait Execute: Send {
    /// Run a query returning a single `bigint` and return it.
    fn fetch_count(
        &mut self,
        query: &CompiledQuery,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Run a query and return every row it produces.
    fn fetch_rows(
        &mut self,
        query: &CompiledQuery,
    ) -> impl Future<Output = Result<Vec<Row>, sqlx::Error>> + Send;
}

/// Blocking statement execution. Each call occupies the calling thread.
pub trait BlockingExecute {
    fn fetch_count(&mut self, query: &CompiledQuery) -> Result<i64, sqlx::Error>;

    fn fetch_rows(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, sqlx::Error>;
}

impl Execute for PgConnection {
    async fn fetch_count(&mut self, query: &CompiledQuery) -> Result<i64, sqlx::Error> {
        debug!(sql = %query.sql, params = query.params.len(), "Executing count");
        let args = query.arguments()?;
        sqlx::query_scalar_with::<Postgres, i64, _>(&query.sql, args)
            .fetch_one(&mut *self)
            .await
    }

    async fn fetch_rows(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, sqlx::Error> {
        debug!(sql = %query.sql, params = query.params.len(), "Executing fetch");
        let args = query.arguments()?;
        let rows = sqlx::query_with(&query.sql, args)
            .fetch_all(&mut *self)
            .await?;
        rows.iter().map(row_values).collect()
    }
}

impl Execute for PoolConnection<Postgres> {
    async fn fetch_count(&mut self, query: &CompiledQuery) -> Result<i64, sqlx::Error> {
        Execute::fetch_count(&mut **self, query).await
    }

    async fn fetch_rows(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, sqlx::Error> {
        Execute::fetch_rows(&mut **self, query).await
    }
}

//! Batched pagination over arbitrary SELECT queries.
//!
//! A [`Paginator`] splits a query's result set into fixed-size batches using
//! `LIMIT`/`OFFSET`, so a caller can walk a large result without holding all
//! of it in memory. The row total is computed once, up front, with
//! `SELECT COUNT(*) FROM (<query>) AS _sub`.
//!
//! Both calling conventions share the same query text and the same
//! [`PageWindow`] arithmetic:
//!
//! - [`Paginator::paginate`] returns a `Stream` over an [`Execute`] connection
//! - [`Paginator::paginate_blocking`] returns an `Iterator` over a [`BlockingExecute`] one
//!
//! Pagination ends when the offset reaches the total or a batch comes back
//! short. The short-batch check wins over the count, so rows deleted after the
//! count was taken end pagination early instead of producing empty batches.
//! Rows inserted after the count are not visited.

use crate::db::executor::{BlockingExecute, Execute};
use crate::db::params::{CompiledQuery, compile};
use crate::error::{DbError, DbResult};
use crate::models::{Batch, DEFAULT_BATCH_SIZE, QueryParam, QueryParams};
use futures_util::Stream;
use futures_util::stream;
use tracing::debug;

/// Placeholder names appended by the bounded query. Callers may not use them.
pub const RESERVED_PARAMS: [&str; 2] = ["limit", "offset"];

/// Position of a pagination run.
///
/// Pure arithmetic, no I/O: the executor-facing code asks for the next bounds,
/// fetches, and records how many rows came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    total: u64,
    offset: u64,
    batch_size: u64,
    done: bool,
}

impl PageWindow {
    pub fn new(total: u64, batch_size: u32) -> Self {
        Self {
            total,
            offset: 0,
            batch_size: u64::from(batch_size.max(1)),
            done: total == 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `(limit, offset)` of the next fetch, or `None` once pagination is over.
    pub fn next_bounds(&self) -> Option<(u64, u64)> {
        if self.done || self.offset >= self.total {
            return None;
        }
        Some((self.batch_size, self.offset))
    }

    /// Record that a fetch returned `received` rows.
    pub fn record(&mut self, received: usize) {
        let received = received as u64;
        self.offset = self.offset.saturating_add(self.batch_size).min(self.total);
        if received < self.batch_size || self.offset >= self.total {
            self.done = true;
        }
    }

    /// Number of batches a run emits when the count is accurate.
    pub fn expected_batches(&self) -> u64 {
        self.total.div_ceil(self.batch_size)
    }
}

/// A query prepared for batched retrieval.
#[derive(Debug, Clone)]
pub struct Paginator {
    query: String,
    params: QueryParams,
    batch_size: u32,
}

impl Paginator {
    /// Prepare `query` with no parameters and the default batch size.
    ///
    /// Trailing whitespace and a trailing `;` are removed so the query can be
    /// wrapped and extended.
    pub fn new(query: impl Into<String>) -> DbResult<Self> {
        let query = query.into();
        let query = query
            .trim()
            .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
            .to_string();
        if query.is_empty() {
            return Err(DbError::invalid_input("Query cannot be empty"));
        }
        Ok(Self {
            query,
            params: QueryParams::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Replace the named parameters bound to the query.
    pub fn with_params(mut self, params: QueryParams) -> DbResult<Self> {
        if let Some(name) = params
            .keys()
            .find(|k| RESERVED_PARAMS.contains(&k.as_str()))
        {
            return Err(DbError::invalid_input(format!(
                "Parameter name '{name}' is reserved for pagination"
            )));
        }
        self.params = params;
        Ok(self)
    }

    /// Bind one named parameter.
    pub fn with_param(self, name: &str, value: impl Into<QueryParam>) -> DbResult<Self> {
        let mut params = self.params.clone();
        params.insert(name.trim_start_matches(':').to_string(), value.into());
        self.with_params(params)
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> DbResult<Self> {
        if batch_size == 0 {
            return Err(DbError::invalid_input("Batch size must be greater than 0"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Text of the row-count query.
    pub fn count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM ({}) AS _sub", self.query)
    }

    /// Text of the bounded per-batch query, with its named bounds.
    pub fn batch_query(&self) -> String {
        format!("{} LIMIT :limit OFFSET :offset", self.query)
    }

    fn compiled_count(&self) -> DbResult<CompiledQuery> {
        compile(&self.count_query(), &self.params)
    }

    fn compiled_batch(&self, limit: u64, offset: u64) -> DbResult<CompiledQuery> {
        let mut params = self.params.clone();
        params.insert("limit".to_string(), QueryParam::Int(to_i64(limit)));
        params.insert("offset".to_string(), QueryParam::Int(to_i64(offset)));
        compile(&self.batch_query(), &params)
    }

    fn window(&self, count: i64) -> PageWindow {
        let total = u64::try_from(count).unwrap_or(0);
        debug!(total, batch_size = self.batch_size, "Counted rows for pagination");
        PageWindow::new(total, self.batch_size)
    }

    /// Count the rows the query returns.
    pub async fn total_count<E: Execute>(&self, conn: &mut E) -> DbResult<u64> {
        let query = self.compiled_count()?;
        let count = conn
            .fetch_count(&query)
            .await
            .map_err(|e| DbError::pagination(&query.sql, &e))?;
        Ok(self.window(count).total())
    }

    /// Blocking form of [`total_count`](Self::total_count).
    pub fn total_count_blocking<E: BlockingExecute>(&self, conn: &mut E) -> DbResult<u64> {
        let query = self.compiled_count()?;
        let count = conn
            .fetch_count(&query)
            .map_err(|e| DbError::pagination(&query.sql, &e))?;
        Ok(self.window(count).total())
    }

    async fn fetch_batch<E: Execute>(&self, conn: &mut E, limit: u64, offset: u64) -> DbResult<Batch> {
        let query = self.compiled_batch(limit, offset)?;
        let rows = conn
            .fetch_rows(&query)
            .await
            .map_err(|e| DbError::pagination(&query.sql, &e))?;
        debug!(offset, limit, rows = rows.len(), "Fetched batch");
        Ok(rows)
    }

    fn fetch_batch_blocking<E: BlockingExecute>(
        &self,
        conn: &mut E,
        limit: u64,
        offset: u64,
    ) -> DbResult<Batch> {
        let query = self.compiled_batch(limit, offset)?;
        let rows = conn
            .fetch_rows(&query)
            .map_err(|e| DbError::pagination(&query.sql, &e))?;
        debug!(offset, limit, rows = rows.len(), "Fetched batch");
        Ok(rows)
    }

    /// Stream the query's rows in batches over `conn`.
    ///
    /// The count runs on first poll. A failed count or fetch yields one `Err`
    /// and ends the stream. The connection stays borrowed until the stream is
    /// dropped.
    pub fn paginate<'a, E: Execute>(
        &'a self,
        conn: &'a mut E,
    ) -> impl Stream<Item = DbResult<Batch>> + Send + 'a {
        stream::unfold(PageState::Counting(conn), move |state| async move {
            let (conn, mut window) = match state {
                PageState::Done => return None,
                PageState::Counting(conn) => match self.total_count(&mut *conn).await {
                    Ok(total) => (conn, PageWindow::new(total, self.batch_size)),
                    Err(e) => return Some((Err(e), PageState::Done)),
                },
                PageState::Fetching(conn, window) => (conn, window),
            };

            let (limit, offset) = window.next_bounds()?;
            match self.fetch_batch(&mut *conn, limit, offset).await {
                Ok(rows) if rows.is_empty() => None,
                Ok(rows) => {
                    window.record(rows.len());
                    Some((Ok(rows), PageState::Fetching(conn, window)))
                }
                Err(e) => Some((Err(e), PageState::Done)),
            }
        })
    }

    /// Iterate the query's rows in batches over a blocking connection.
    pub fn paginate_blocking<'a, E: BlockingExecute>(
        &'a self,
        conn: &'a mut E,
    ) -> BlockingPages<'a, E> {
        BlockingPages {
            paginator: self,
            conn,
            window: None,
            finished: false,
        }
    }
}

enum PageState<'a, E> {
    Counting(&'a mut E),
    Fetching(&'a mut E, PageWindow),
    Done,
}

/// Iterator returned by [`Paginator::paginate_blocking`].
///
/// Each call to `next` runs at most one statement on the borrowed connection.
pub struct BlockingPages<'a, E> {
    paginator: &'a Paginator,
    conn: &'a mut E,
    window: Option<PageWindow>,
    finished: bool,
}

impl<E> BlockingPages<'_, E> {
    /// Row total, once the count has run.
    pub fn total(&self) -> Option<u64> {
        self.window.map(|w| w.total())
    }
}

impl<E: BlockingExecute> Iterator for BlockingPages<'_, E> {
    type Item = DbResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.window.is_none() {
            match self.paginator.total_count_blocking(self.conn) {
                Ok(total) => self.window = Some(PageWindow::new(total, self.paginator.batch_size)),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        let Some(window) = self.window.as_mut() else {
            return None;
        };

        let Some((limit, offset)) = window.next_bounds() else {
            self.finished = true;
            return None;
        };
        match self
            .paginator
            .fetch_batch_blocking(self.conn, limit, offset)
        {
            Ok(rows) if rows.is_empty() => {
                self.finished = true;
                None
            }
            Ok(rows) => {
                window.record(rows.len());
                Some(Ok(rows))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::executor::memory::MemoryTable;
    use futures_util::{StreamExt, TryStreamExt};
    use rand::Rng;
    use serde_json::json;

    fn people() -> MemoryTable {
        MemoryTable::new(vec![
            vec![json!(1), json!("Alice")],
            vec![json!(2), json!("Bob")],
            vec![json!(3), json!("Charlie")],
            vec![json!(4), json!("David")],
        ])
    }

    fn numbers(n: usize) -> MemoryTable {
        MemoryTable::new((0..n).map(|i| vec![json!(i)]).collect())
    }

    #[test]
    fn test_query_text() {
        let p = Paginator::new("SELECT * FROM t;\n").unwrap();
        assert_eq!(p.query(), "SELECT * FROM t");
        assert_eq!(p.count_query(), "SELECT COUNT(*) FROM (SELECT * FROM t) AS _sub");
        assert_eq!(p.batch_query(), "SELECT * FROM t LIMIT :limit OFFSET :offset");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Paginator::new("  ;  ").is_err());
        let err = Paginator::new("SELECT 1")
            .unwrap()
            .with_batch_size(0)
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let err = Paginator::new("SELECT 1")
            .unwrap()
            .with_param("limit", 5)
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[tokio::test]
    async fn test_paginate_four_rows_in_two_batches() {
        let mut table = people();
        let p = Paginator::new("SELECT * FROM t")
            .unwrap()
            .with_batch_size(2)
            .unwrap();

        assert_eq!(p.total_count(&mut table).await.unwrap(), 4);
        let batches: Vec<Batch> = p.paginate(&mut table).try_collect().await.unwrap();
        assert_eq!(
            batches,
            vec![
                vec![vec![json!(1), json!("Alice")], vec![json!(2), json!("Bob")]],
                vec![
                    vec![json!(3), json!("Charlie")],
                    vec![json!(4), json!("David")]
                ],
            ]
        );

        // count, count, two batch fetches
        assert_eq!(table.executed.len(), 4);
        assert_eq!(
            table.executed[2].sql,
            "SELECT * FROM t LIMIT $1 OFFSET $2"
        );
        assert_eq!(
            table.executed[3].params,
            vec![QueryParam::Int(2), QueryParam::Int(2)]
        );
    }

    #[test]
    fn test_paginate_blocking_four_rows_in_two_batches() {
        let mut table = people();
        let p = Paginator::new("SELECT * FROM t")
            .unwrap()
            .with_batch_size(2)
            .unwrap();

        let mut pages = p.paginate_blocking(&mut table);
        assert_eq!(pages.total(), None);
        let first = pages.next().unwrap().unwrap();
        assert_eq!(pages.total(), Some(4));
        let second = pages.next().unwrap().unwrap();
        assert!(pages.next().is_none());
        assert!(pages.next().is_none());

        assert_eq!(first[1], vec![json!(2), json!("Bob")]);
        assert_eq!(second[0], vec![json!(3), json!("Charlie")]);
    }

    #[tokio::test]
    async fn test_empty_table_yields_no_batches() {
        let p = Paginator::new("SELECT * FROM empty").unwrap();

        let mut table = numbers(0);
        let batches: Vec<Batch> = p.paginate(&mut table).try_collect().await.unwrap();
        assert!(batches.is_empty());
        // Only the count ran
        assert_eq!(table.executed.len(), 1);

        let mut table = numbers(0);
        assert_eq!(p.paginate_blocking(&mut table).count(), 0);
        assert_eq!(table.executed.len(), 1);
    }

    #[tokio::test]
    async fn test_short_last_batch() {
        let p = Paginator::new("SELECT n FROM t")
            .unwrap()
            .with_batch_size(3)
            .unwrap();
        let mut table = numbers(7);
        let sizes: Vec<usize> = p
            .paginate(&mut table)
            .map(|b| b.unwrap().len())
            .collect()
            .await;
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_params_are_bound_not_interpolated() {
        let mut table = people();
        let p = Paginator::new("SELECT * FROM users WHERE name LIKE :name")
            .unwrap()
            .with_param("name", "A%")
            .unwrap()
            .with_batch_size(10)
            .unwrap();

        let _: Vec<Batch> = p.paginate(&mut table).try_collect().await.unwrap();
        let count = &table.executed[0];
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) FROM (SELECT * FROM users WHERE name LIKE $1) AS _sub"
        );
        assert_eq!(count.params, vec![QueryParam::String("A%".to_string())]);

        let batch = &table.executed[1];
        assert_eq!(
            batch.sql,
            "SELECT * FROM users WHERE name LIKE $1 LIMIT $2 OFFSET $3"
        );
        assert!(!batch.sql.contains("A%"));
        assert_eq!(batch.params[0], QueryParam::String("A%".to_string()));
    }

    #[tokio::test]
    async fn test_stale_count_ends_on_short_batch() {
        // Count says 10 but only 3 rows remain
        let mut table = numbers(3);
        table.count_override = Some(10);
        let p = Paginator::new("SELECT n FROM t")
            .unwrap()
            .with_batch_size(2)
            .unwrap();

        let batches: Vec<Batch> = p.paginate(&mut table).try_collect().await.unwrap();
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);

        // Rows gone entirely after an exact multiple: no empty batch emitted
        let mut table = numbers(2);
        table.count_override = Some(10);
        let batches: Vec<Batch> = p.paginate_blocking(&mut table).collect::<DbResult<_>>().unwrap();
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_driver_error_carries_query() {
        let p = Paginator::new("SELECT * FROM missing").unwrap();

        let mut table = numbers(0);
        table.fail_on = Some("missing".to_string());
        let results: Vec<DbResult<Batch>> = p.paginate(&mut table).collect().await;
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(DbError::Pagination { query, .. }) => assert!(query.contains("COUNT(*)")),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut table = numbers(5);
        table.fail_on = Some("LIMIT".to_string());
        let mut pages = p.paginate_blocking(&mut table);
        match pages.next() {
            Some(Err(DbError::Pagination { query, .. })) => assert!(query.contains("LIMIT $1")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_page_window_basics() {
        let mut w = PageWindow::new(5, 2);
        assert_eq!(w.expected_batches(), 3);
        assert_eq!(w.next_bounds(), Some((2, 0)));
        w.record(2);
        assert_eq!(w.next_bounds(), Some((2, 2)));
        w.record(2);
        assert_eq!(w.next_bounds(), Some((2, 4)));
        w.record(1);
        assert!(w.is_done());
        assert_eq!(w.offset(), 5);
        assert_eq!(w.next_bounds(), None);

        assert!(PageWindow::new(0, 10).is_done());
    }

    #[test]
    fn test_page_window_random_totals() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let total: u64 = rng.gen_range(0..5_000);
            let batch_size: u32 = rng.gen_range(1..300);

            let mut window = PageWindow::new(total, batch_size);
            let mut fetched = 0u64;
            let mut batches = 0u64;
            while let Some((limit, offset)) = window.next_bounds() {
                assert_eq!(offset, fetched);
                let received = limit.min(total - offset);
                fetched += received;
                batches += 1;
                window.record(received as usize);
                assert!(window.offset() <= total);
            }

            assert_eq!(fetched, total);
            assert_eq!(batches, window.expected_batches());
        }
    }
}

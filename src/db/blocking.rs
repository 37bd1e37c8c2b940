//! Blocking API.
//!
//! Thin wrappers that drive the async managers from an owned tokio runtime,
//! so callers without a runtime of their own can use the same lifecycle and
//! pagination code. Every call occupies the calling thread until the driver
//! returns.
//!
//! These types must not be used from inside an async context: `block_on`
//! panics when called on a runtime worker.

use crate::config::{DatabaseSettings, DatasourceSettings};
use crate::db::executor::{BlockingExecute, Execute};
use crate::db::lifecycle::{DatabaseManager, NameLocks, require_mode};
use crate::db::params::CompiledQuery;
use crate::db::registry::DatasourceRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{ExecutionMode, Row};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use std::sync::Arc;
use tokio::runtime::Runtime;

const WORKER_THREADS: usize = 2;

fn build_runtime() -> DbResult<Arc<Runtime>> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("pgutils-blocking")
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|e| DbError::internal(format!("Failed to start runtime: {e}")))
}

/// Blocking handle to one managed database.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseManager>,
    runtime: Arc<Runtime>,
}

impl Database {
    /// Create a blocking manager. `settings` must select blocking mode.
    pub fn new(settings: DatabaseSettings) -> DbResult<Self> {
        require_mode(&settings, ExecutionMode::Blocking)?;
        let runtime = build_runtime()?;
        let inner = DatabaseManager::build(settings, NameLocks::new())?;
        Ok(Self {
            inner: Arc::new(inner),
            runtime,
        })
    }

    pub fn settings(&self) -> &DatabaseSettings {
        self.inner.settings()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn database_exists(&self, name: &str) -> DbResult<bool> {
        self.runtime.block_on(self.inner.database_exists(name))
    }

    pub fn create_database_if_not_exists(&self, name: &str) -> DbResult<bool> {
        self.runtime
            .block_on(self.inner.create_database_if_not_exists(name))
    }

    pub fn drop_database_if_exists(&self, name: &str) -> DbResult<bool> {
        self.runtime
            .block_on(self.inner.drop_database_if_exists(name))
    }

    pub fn ensure_database(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.ensure_database())
    }

    /// Check out an application connection, creating the database first if needed.
    pub fn get_connection(&self) -> DbResult<Connection> {
        let conn = self.runtime.block_on(self.inner.get_connection())?;
        Ok(Connection {
            conn: Some(conn),
            runtime: Arc::clone(&self.runtime),
        })
    }

    pub fn disconnect(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.disconnect())
    }
}

/// A checked-out application connection usable from blocking code.
///
/// Returned to its pool on drop.
pub struct Connection {
    /// Always `Some` until drop.
    conn: Option<PoolConnection<Postgres>>,
    runtime: Arc<Runtime>,
}

impl Connection {
    fn pooled(&mut self) -> Result<&mut PoolConnection<Postgres>, sqlx::Error> {
        self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)
    }
}

impl BlockingExecute for Connection {
    fn fetch_count(&mut self, query: &CompiledQuery) -> Result<i64, sqlx::Error> {
        let runtime = Arc::clone(&self.runtime);
        let conn = self.pooled()?;
        runtime.block_on(Execute::fetch_count(conn, query))
    }

    fn fetch_rows(&mut self, query: &CompiledQuery) -> Result<Vec<Row>, sqlx::Error> {
        let runtime = Arc::clone(&self.runtime);
        let conn = self.pooled()?;
        runtime.block_on(Execute::fetch_rows(conn, query))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Returning a connection to its pool spawns a task, which needs a runtime context.
        let _enter = self.runtime.enter();
        drop(self.conn.take());
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

/// Blocking handle to a [`DatasourceRegistry`].
#[derive(Debug)]
pub struct Registry {
    inner: DatasourceRegistry,
    runtime: Arc<Runtime>,
}

impl Registry {
    /// Build a blocking registry. Every database must select blocking mode.
    pub fn new(settings: DatasourceSettings) -> DbResult<Self> {
        for db in settings.databases() {
            require_mode(db, ExecutionMode::Blocking)?;
        }
        let runtime = build_runtime()?;
        let inner = DatasourceRegistry::build(settings)?;
        Ok(Self { inner, runtime })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn get(&self, name: &str) -> DbResult<Database> {
        Ok(Database {
            inner: self.inner.get(name)?,
            runtime: Arc::clone(&self.runtime),
        })
    }

    pub fn connect_all(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.connect_all())
    }

    pub fn disconnect_all(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.disconnect_all())
    }
}

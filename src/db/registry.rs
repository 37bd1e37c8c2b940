//! Registry of database managers sharing one administrative identity.
//!
//! Built once from [`DatasourceSettings`]; the set of managers never changes
//! afterwards, so lookups need no locking.

use crate::config::{DatabaseSettings, DatasourceSettings};
use crate::db::lifecycle::{DatabaseManager, NameLocks, require_mode};
use crate::error::{DbError, DbResult};
use crate::models::ExecutionMode;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay before the first retry; later retries wait proportionally longer.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Named collection of [`DatabaseManager`]s.
#[derive(Debug)]
pub struct DatasourceRegistry {
    name: String,
    retry_attempts: u32,
    /// Configuration order, for stable iteration.
    order: Vec<String>,
    managers: HashMap<String, Arc<DatabaseManager>>,
}

impl DatasourceRegistry {
    /// Build a registry for non-blocking use.
    ///
    /// Every database must be configured for non-blocking mode.
    pub fn new(settings: DatasourceSettings) -> DbResult<Self> {
        for db in settings.databases() {
            require_mode(db, ExecutionMode::NonBlocking)?;
        }
        Self::build(settings)
    }

    pub(crate) fn build(settings: DatasourceSettings) -> DbResult<Self> {
        let name = settings.name().to_string();
        let retry_attempts = settings.retry_attempts();
        let locks = NameLocks::new();
        let mut order = Vec::new();
        let mut managers = HashMap::new();

        for db in settings.into_databases() {
            let db_name = db.name().to_string();
            let manager = DatabaseManager::build(db, Arc::clone(&locks))?;
            if managers
                .insert(db_name.clone(), Arc::new(manager))
                .is_some()
            {
                return Err(DbError::configuration(
                    "databases",
                    format!("duplicate database name '{db_name}'"),
                ));
            }
            order.push(db_name);
        }

        info!(datasource = %name, databases = order.len(), "Datasource registry created");
        Ok(Self {
            name,
            retry_attempts,
            order,
            managers,
        })
    }

    /// Datasource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the manager for `name`.
    pub fn get(&self, name: &str) -> DbResult<Arc<DatabaseManager>> {
        self.managers
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::unknown_datasource(name))
    }

    /// Database names in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Settings of every database, in configuration order.
    pub fn settings(&self) -> Vec<&DatabaseSettings> {
        self.managers().map(|m| m.settings()).collect()
    }

    fn managers(&self) -> impl Iterator<Item = &Arc<DatabaseManager>> {
        self.order.iter().filter_map(|name| self.managers.get(name))
    }

    /// Create every missing database and open one application connection to each.
    ///
    /// A retryable failure is retried up to the datasource's `retry_attempts`.
    /// All databases are attempted; failures are reported together.
    pub async fn connect_all(&self) -> DbResult<()> {
        let attempts = self.retry_attempts;
        let results = join_all(self.managers().map(|manager| async move {
            let result = with_retries(attempts, move || async move {
                manager.get_connection().await.map(drop)
            })
            .await;
            (manager.name().to_string(), result)
        }))
        .await;

        let failures = collect_failures(results, "connect");
        if failures.is_empty() {
            info!(datasource = %self.name, "All databases connected");
            Ok(())
        } else {
            Err(DbError::Connect { failures })
        }
    }

    /// Dispose every manager's pools.
    ///
    /// A failure for one database does not stop the others; failures are
    /// reported together.
    pub async fn disconnect_all(&self) -> DbResult<()> {
        let results = join_all(self.managers().map(|manager| async move {
            (manager.name().to_string(), manager.disconnect().await)
        }))
        .await;

        let failures = collect_failures(results, "disconnect");
        if failures.is_empty() {
            info!(datasource = %self.name, "All databases disconnected");
            Ok(())
        } else {
            Err(DbError::Disconnect { failures })
        }
    }
}

/// Run `op`, retrying up to `attempts` more times while it fails with a
/// retryable error.
async fn with_retries<F, Fut>(attempts: u32, mut op: F) -> DbResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<()>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < attempts => {
                attempt += 1;
                debug!(attempt, error = %e, "Retrying after failure");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            result => return result,
        }
    }
}

fn collect_failures(
    results: Vec<(String, DbResult<()>)>,
    operation: &str,
) -> Vec<(String, DbError)> {
    results
        .into_iter()
        .filter_map(|(name, result)| {
            result.err().map(|e| {
                warn!(database = %name, error = %e, "Failed to {operation}");
                (name, e)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn db(uri: &str, mode: ExecutionMode) -> DatabaseSettings {
        DatabaseSettings::new(uri, "ignored", "ignored")
            .unwrap()
            .with_mode(mode)
    }

    fn datasource(mode: ExecutionMode) -> DatasourceSettings {
        DatasourceSettings::new(
            "ds",
            "admin",
            "pw",
            vec![
                db("postgresql://u:p@127.0.0.1:1/db1", mode),
                db("postgresql://u:p@127.0.0.1:1/db2", mode),
            ],
        )
        .unwrap()
        .with_connection_timeout(Duration::from_millis(200))
        .unwrap()
        .with_retry_attempts(0)
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DatasourceRegistry::new(datasource(ExecutionMode::NonBlocking)).unwrap();
        assert_eq!(registry.name(), "ds");
        assert_eq!(registry.names(), vec!["db1", "db2"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("db2").unwrap().name(), "db2");
        assert_eq!(registry.get("db1").unwrap().settings().admin_username(), "admin");
    }

    #[test]
    fn test_registry_unknown_name() {
        let registry = DatasourceRegistry::new(datasource(ExecutionMode::NonBlocking)).unwrap();
        match registry.get("db3") {
            Err(DbError::UnknownDatasource { name }) => assert_eq!(name, "db3"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_registry_rejects_blocking_settings() {
        let err = DatasourceRegistry::new(datasource(ExecutionMode::Blocking)).unwrap_err();
        assert!(matches!(err, DbError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_all_without_connections() {
        let registry = DatasourceRegistry::new(datasource(ExecutionMode::NonBlocking)).unwrap();
        registry.disconnect_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_all_collects_every_failure() {
        let registry = DatasourceRegistry::new(datasource(ExecutionMode::NonBlocking)).unwrap();
        match registry.connect_all().await {
            Err(DbError::Connect { failures }) => {
                let names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["db1", "db2"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_all_retries_unreachable_databases() {
        let settings = datasource(ExecutionMode::NonBlocking).with_retry_attempts(1);
        let registry = DatasourceRegistry::new(settings).unwrap();
        match registry.connect_all().await {
            Err(DbError::Connect { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|(_, e)| matches!(e, DbError::Connection { .. })));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_retries_stops_after_attempts() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries(2, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::connection("refused", "start the server"))
        })
        .await;
        assert!(matches!(result, Err(DbError::Connection { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_skips_permanent_errors() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries(5, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DbError::configuration("uri", "bad"))
        })
        .await;
        assert!(matches!(result, Err(DbError::Configuration { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries(5, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DbError::timeout("connect", 1))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collect_failures_keeps_only_errors() {
        let failures = collect_failures(
            vec![
                ("a".to_string(), Ok(())),
                ("b".to_string(), Err(DbError::timeout("dispose b", 1))),
            ],
            "disconnect",
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
    }
}

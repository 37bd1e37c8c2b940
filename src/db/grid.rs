//! Grid of datasources, each a [`DatasourceRegistry`] keyed by its name.
//!
//! The grid is async only. Blocking callers build one
//! [`blocking::Registry`](crate::db::blocking::Registry) per datasource.

use crate::config::DatasourceSettings;
use crate::db::lifecycle::DatabaseManager;
use crate::db::registry::DatasourceRegistry;
use crate::error::{DbError, DbResult};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Every configured datasource, in configuration order.
#[derive(Debug)]
pub struct DataGrid {
    order: Vec<String>,
    registries: HashMap<String, Arc<DatasourceRegistry>>,
}

impl DataGrid {
    /// Build a registry per datasource. Datasource names must be unique.
    pub fn new(datasources: Vec<DatasourceSettings>) -> DbResult<Self> {
        let mut order = Vec::with_capacity(datasources.len());
        let mut registries = HashMap::with_capacity(datasources.len());

        for settings in datasources {
            let name = settings.name().to_string();
            if registries.contains_key(&name) {
                return Err(DbError::configuration(
                    "datasources",
                    format!("duplicate datasource name '{name}'"),
                ));
            }
            let registry = DatasourceRegistry::new(settings)?;
            registries.insert(name.clone(), Arc::new(registry));
            order.push(name);
        }

        info!(datasources = order.len(), "Data grid created");
        Ok(Self { order, registries })
    }

    /// Look up the registry for datasource `name`.
    pub fn get(&self, name: &str) -> DbResult<Arc<DatasourceRegistry>> {
        self.registries
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::unknown_datasource(name))
    }

    /// Look up one database manager by datasource and database name.
    pub fn database(&self, datasource: &str, database: &str) -> DbResult<Arc<DatabaseManager>> {
        self.get(datasource)?.get(database)
    }

    /// Datasource names in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn registries(&self) -> impl Iterator<Item = &Arc<DatasourceRegistry>> {
        self.order.iter().filter_map(|name| self.registries.get(name))
    }

    /// Connect every database of every datasource.
    ///
    /// Failures are reported together, labelled `datasource/database`.
    pub async fn connect_all(&self) -> DbResult<()> {
        let results = join_all(self.registries().map(|registry| async move {
            (registry.name().to_string(), registry.connect_all().await)
        }))
        .await;

        let failures = flatten_failures(results);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DbError::Connect { failures })
        }
    }

    /// Disconnect every database of every datasource.
    ///
    /// A failing datasource does not stop the others; failures are reported
    /// together, labelled `datasource/database`.
    pub async fn disconnect_all(&self) -> DbResult<()> {
        let results = join_all(self.registries().map(|registry| async move {
            (registry.name().to_string(), registry.disconnect_all().await)
        }))
        .await;

        let failures = flatten_failures(results);
        if failures.is_empty() {
            info!(datasources = self.len(), "Data grid disconnected");
            Ok(())
        } else {
            Err(DbError::Disconnect { failures })
        }
    }
}

/// Lift per-datasource failures to grid level, prefixing database names with
/// their datasource.
fn flatten_failures(results: Vec<(String, DbResult<()>)>) -> Vec<(String, DbError)> {
    results
        .into_iter()
        .flat_map(|(datasource, result)| match result {
            Ok(()) => Vec::new(),
            Err(DbError::Connect { failures } | DbError::Disconnect { failures }) => failures
                .into_iter()
                .map(|(db, e)| (format!("{datasource}/{db}"), e))
                .collect(),
            Err(e) => vec![(datasource, e)],
        })
        .collect()
}

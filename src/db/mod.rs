//! Database access layer.
//!
//! This module provides PostgreSQL access functionality:
//! - Connection pool management
//! - Database lifecycle (exists/create/drop) over an admin connection
//! - Datasource registry for groups of databases, and a grid of datasources
//! - Batched pagination in async and blocking form
//! - Named parameter binding and row decoding

pub mod blocking;
pub mod executor;
pub mod grid;
pub mod lifecycle;
pub mod paginator;
pub mod params;
pub mod pool;
pub mod registry;
pub mod types;

pub use executor::{BlockingExecute, Execute};
pub use grid::DataGrid;
pub use lifecycle::{DatabaseManager, NameLocks, quote_ident};
pub use paginator::{BlockingPages, PageWindow, Paginator};
pub use params::CompiledQuery;
pub use pool::ConnectionPool;
pub use registry::DatasourceRegistry;

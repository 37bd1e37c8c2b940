//! pgutils library
//!
//! Managed access to PostgreSQL databases: validated connection settings,
//! database lifecycle operations over an administrative connection, and a
//! batched pagination engine with async and blocking front ends.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DatabaseSettings, DatasourceSettings};
pub use db::{DataGrid, DatabaseManager, DatasourceRegistry, Paginator};
pub use error::{DbError, DbResult};

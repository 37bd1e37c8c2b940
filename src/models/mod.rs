//! Data models for pgutils.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ExecutionMode, PoolScope};
pub use query::{Batch, DEFAULT_BATCH_SIZE, QueryParam, QueryParams, Row};

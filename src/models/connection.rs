//! Connection-related data models.
//!
//! This module defines the execution mode carried by every settings value and the
//! scope a connection pool is bound to.

use serde::{Deserialize, Serialize};

/// Calling convention used for I/O against a database.
///
/// Fixed once per settings value. The async API accepts only `NonBlocking`
/// settings and the `blocking` facade accepts only `Blocking` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every operation occupies the calling thread until the driver returns.
    #[default]
    Blocking,
    /// Operations suspend at I/O boundaries on a tokio runtime.
    NonBlocking,
}

impl ExecutionMode {
    /// Map the `async_mode` settings flag to a mode.
    pub fn from_async_flag(async_mode: bool) -> Self {
        if async_mode {
            Self::NonBlocking
        } else {
            Self::Blocking
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::NonBlocking)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::NonBlocking => write!(f, "non-blocking"),
        }
    }
}

/// Target a connection pool is bound to.
///
/// Distinguishes the administrative pool (no database selected, used for
/// `CREATE DATABASE` and friends) from the application pool of one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolScope {
    /// Server-level pool - no target database selected.
    Server,
    /// Database-specific pool - targets a specific database.
    Database(String),
}

impl std::fmt::Display for PoolScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolScope::Server => write!(f, "server"),
            PoolScope::Database(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_mode_from_flag() {
        assert_eq!(ExecutionMode::from_async_flag(true), ExecutionMode::NonBlocking);
        assert_eq!(ExecutionMode::from_async_flag(false), ExecutionMode::Blocking);
        assert!(ExecutionMode::NonBlocking.is_async());
        assert!(!ExecutionMode::Blocking.is_async());
    }

    #[test]
    fn test_execution_mode_display() {
        assert_eq!(ExecutionMode::Blocking.to_string(), "blocking");
        assert_eq!(ExecutionMode::NonBlocking.to_string(), "non-blocking");
    }

    #[test]
    fn test_pool_scope_display() {
        assert_eq!(PoolScope::Server.to_string(), "server");
        assert_eq!(PoolScope::Database("mydb".to_string()).to_string(), "mydb");
    }
}

//! Error types for pgutils.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Variants carry enough context (field names, database names, the offending SQL)
//! for a caller to decide whether to fix its input, retry, or give up.

use thiserror::Error;

/// SQLSTATE raised by `CREATE DATABASE` when the database already exists.
pub const SQLSTATE_DUPLICATE_DATABASE: &str = "42P04";

/// SQLSTATE raised when two `CREATE DATABASE` statements race on the catalog index.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE raised by `DROP DATABASE` (without `IF EXISTS`) for a missing database.
pub const SQLSTATE_INVALID_CATALOG_NAME: &str = "3D000";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid configuration for '{field}': {message}")]
    Configuration { field: String, message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection pool exhausted: no {scope} connection available within {timeout_secs}s")]
    PoolExhausted { scope: String, timeout_secs: u64 },

    #[error("Failed to {operation} database '{database}': {source}")]
    DatabaseOperation {
        operation: String,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unknown datasource: {name}")]
    UnknownDatasource { name: String },

    #[error("Pagination failed: {message} (query: {query})")]
    Pagination {
        message: String,
        /// The exact SQL text the driver rejected.
        query: String,
        sql_state: Option<String>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Failed to connect {} database(s): {}", .failures.len(), summarize(.failures))]
    Connect { failures: Vec<(String, DbError)> },

    #[error("Failed to disconnect {} database(s): {}", .failures.len(), summarize(.failures))]
    Disconnect { failures: Vec<(String, DbError)> },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn summarize(failures: &[(String, DbError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl DbError {
    /// Create a configuration error for a specific settings field.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(scope: impl Into<String>, timeout_secs: u64) -> Self {
        Self::PoolExhausted {
            scope: scope.into(),
            timeout_secs,
        }
    }

    /// Create a DDL failure error, keeping the driver error as the source.
    pub fn database_operation(
        operation: impl Into<String>,
        database: impl Into<String>,
        source: sqlx::Error,
    ) -> Self {
        Self::DatabaseOperation {
            operation: operation.into(),
            database: database.into(),
            source,
        }
    }

    /// Create an unknown datasource error.
    pub fn unknown_datasource(name: impl Into<String>) -> Self {
        Self::UnknownDatasource { name: name.into() }
    }

    /// Create a pagination error from a driver failure on `query`.
    pub fn pagination(query: impl Into<String>, source: &sqlx::Error) -> Self {
        let (message, sql_state) = match source {
            sqlx::Error::Database(db_err) => (
                db_err.message().to_string(),
                db_err.code().map(|c| c.to_string()),
            ),
            other => (other.to_string(), None),
        };
        Self::Pagination {
            message,
            query: query.into(),
            sql_state,
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("Release idle connections or raise pool_size/max_overflow")
            }
            Self::UnknownDatasource { .. } => Some("Check the datasource name in the settings"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::PoolExhausted { .. }
        )
    }

    /// SQLSTATE of the underlying server error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } | Self::Pagination { sql_state, .. } => {
                sql_state.as_deref()
            }
            _ => None,
        }
    }
}

/// Extract the SQLSTATE code from a driver error.
pub(crate) fn sqlx_state(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.to_string()),
        _ => None,
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted("pooled", 0),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

//! Configuration handling for pgutils.
//!
//! Two layers live here:
//! - [`DatabaseSettings`] / [`DatasourceSettings`]: validated, immutable descriptions
//!   of how to reach one database (or a group sharing an admin identity).
//! - [`Config`]: the command-line interface of the `pgutils` binary, via clap with
//!   environment-variable fallbacks.

use crate::error::{DbError, DbResult};
use crate::models::{DEFAULT_BATCH_SIZE, ExecutionMode, PoolScope};
use clap::{Parser, Subcommand};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use sqlx::ConnectOptions;
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use tracing::log::LevelFilter;
use url::Url;

pub const DEFAULT_ADMIN_USERNAME: &str = "postgres";
pub const DEFAULT_ADMIN_PASSWORD: &str = "postgres";
pub const DEFAULT_PORT: u16 = 5432;

// Pool configuration defaults
pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_MAX_OVERFLOW: u32 = 5;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SLOW_STATEMENT_SECS: u64 = 1;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// URI schemes accepted for a database URI. `postgresql+<driver>` is accepted
/// too; the driver suffix is kept in rendered URIs and ignored when connecting.
pub const ALLOWED_SCHEMES: &[&str] = &["postgres", "postgresql"];

/// Scheme handed to the driver for every accepted URI.
const DRIVER_SCHEME: &str = "postgresql";

const MASK: &str = "***";

/// Settings as they arrive from a settings file, before validation.
///
/// Integer fields are signed so that a negative pool size is reported as a
/// validation failure rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDatabaseSettings {
    /// Datasource-local name; defaults to the database name in `uri`.
    #[serde(default)]
    pub name: Option<String>,
    pub uri: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default)]
    pub async_mode: bool,
    #[serde(default = "default_pool_size")]
    pub pool_size: i64,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: i64,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default)]
    pub maintenance_database: Option<String>,
    /// Port used when `uri` does not name one.
    #[serde(default = "default_port")]
    pub default_port: i64,
}

fn default_admin_username() -> String {
    DEFAULT_ADMIN_USERNAME.to_string()
}

fn default_admin_password() -> String {
    DEFAULT_ADMIN_PASSWORD.to_string()
}

fn default_pool_size() -> i64 {
    DEFAULT_POOL_SIZE.into()
}

fn default_max_overflow() -> i64 {
    DEFAULT_MAX_OVERFLOW.into()
}

fn default_connection_timeout() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_port() -> i64 {
    DEFAULT_PORT.into()
}

fn default_retry_attempts() -> i64 {
    DEFAULT_RETRY_ATTEMPTS.into()
}

impl RawDatabaseSettings {
    /// Raw settings for `uri` with every other field at its default.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            name: None,
            uri: uri.into(),
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            async_mode: false,
            pool_size: default_pool_size(),
            max_overflow: default_max_overflow(),
            connection_timeout: default_connection_timeout(),
            maintenance_database: None,
            default_port: default_port(),
        }
    }
}

/// Validated description of how to reach one database.
///
/// Immutable once built. The password-bearing URIs are only ever rendered
/// masked; unmasked credentials reach the driver through [`connect_options`].
///
/// [`connect_options`]: DatabaseSettings::connect_options
#[derive(Clone)]
pub struct DatabaseSettings {
    name: String,
    uri: Url,
    db_name: String,
    admin_username: String,
    admin_password: String,
    mode: ExecutionMode,
    pool_size: u32,
    max_overflow: u32,
    connection_timeout: Duration,
    maintenance_database: Option<String>,
    default_port: u16,
}

impl DatabaseSettings {
    /// Validate `uri` and build settings with default pool sizing in blocking mode.
    pub fn new(
        uri: &str,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> DbResult<Self> {
        let (uri, db_name) = parse_uri(uri)?;
        let admin_username = admin_username.into();
        if admin_username.is_empty() {
            return Err(DbError::configuration(
                "admin_username",
                "admin username cannot be empty",
            ));
        }

        Ok(Self {
            name: db_name.clone(),
            uri,
            db_name,
            admin_username,
            admin_password: admin_password.into(),
            mode: ExecutionMode::default(),
            pool_size: DEFAULT_POOL_SIZE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            maintenance_database: None,
            default_port: DEFAULT_PORT,
        })
    }

    /// Validate raw settings.
    pub fn from_raw(raw: RawDatabaseSettings) -> DbResult<Self> {
        let mut settings = Self::new(&raw.uri, raw.admin_username, raw.admin_password)?
            .with_mode(ExecutionMode::from_async_flag(raw.async_mode))
            .with_pool_size(checked_u32("pool_size", raw.pool_size, 1)?)?
            .with_max_overflow(checked_u32("max_overflow", raw.max_overflow, 0)?)
            .with_connection_timeout(Duration::from_secs(raw.connection_timeout))?
            .with_default_port(checked_port(raw.default_port)?)?;
        if let Some(name) = raw.name {
            settings = settings.with_name(name)?;
        }
        if let Some(db) = raw.maintenance_database {
            settings = settings.with_maintenance_database(db)?;
        }
        Ok(settings)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> DbResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DbError::configuration("name", "name cannot be empty"));
        }
        self.name = name;
        Ok(self)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> DbResult<Self> {
        if pool_size == 0 {
            return Err(DbError::configuration(
                "pool_size",
                "Input should be greater than 0",
            ));
        }
        self.pool_size = pool_size;
        Ok(self)
    }

    pub fn with_max_overflow(mut self, max_overflow: u32) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> DbResult<Self> {
        if timeout.is_zero() {
            return Err(DbError::configuration(
                "connection_timeout",
                "Input should be greater than 0",
            ));
        }
        self.connection_timeout = timeout;
        Ok(self)
    }

    /// Port used when the URI does not name one.
    pub fn with_default_port(mut self, port: u16) -> DbResult<Self> {
        if port == 0 {
            return Err(DbError::configuration(
                "default_port",
                "Input should be greater than 0",
            ));
        }
        self.default_port = port;
        Ok(self)
    }

    /// Database the server-scope pool logs into. It must differ from the managed
    /// database, otherwise dropping it would terminate the admin connection itself.
    pub fn with_maintenance_database(mut self, database: impl Into<String>) -> DbResult<Self> {
        let database = database.into();
        if database.is_empty() {
            return Err(DbError::configuration(
                "maintenance_database",
                "maintenance database cannot be empty",
            ));
        }
        if database == self.db_name {
            return Err(DbError::configuration(
                "maintenance_database",
                format!("maintenance database must differ from '{}'", self.db_name),
            ));
        }
        self.maintenance_database = Some(database);
        Ok(self)
    }

    /// Replace the administrative identity (used by datasources that share one).
    pub(crate) fn with_admin_identity(mut self, username: &str, password: &str) -> Self {
        self.admin_username = username.to_string();
        self.admin_password = password.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database name parsed from the URI path, percent-decoded.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    /// Server port, falling back to the configured default port.
    pub fn port(&self) -> u16 {
        self.uri.port().unwrap_or(self.default_port)
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    pub fn max_overflow(&self) -> u32 {
        self.max_overflow
    }

    /// Upper bound on concurrently checked-out connections per pool.
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow)
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn maintenance_database(&self) -> Option<&str> {
        self.maintenance_database.as_deref()
    }

    /// The URI as configured, password masked.
    pub fn uri(&self) -> String {
        mask(&self.uri)
    }

    /// Full application URI: original credentials, database path, password masked.
    pub fn complete_uri(&self) -> String {
        mask(&self.uri)
    }

    /// Server-scope URI: admin identity, no database path, password masked.
    pub fn admin_uri(&self) -> String {
        let mut url = self.server_url();
        // Host presence was checked at parse time, so the setters cannot fail.
        let _ = url.set_username(&self.admin_username);
        let _ = url.set_password(Some(MASK));
        url.to_string()
    }

    fn server_url(&self) -> Url {
        let mut url = self.uri.clone();
        url.set_path("");
        url
    }

    /// Driver connect options for a pool bound to `scope`.
    ///
    /// Server scope uses the admin identity and selects no database (or the
    /// maintenance database). Database scope keeps the URI credentials and
    /// selects the named database.
    pub fn connect_options(&self, scope: &PoolScope) -> DbResult<PgConnectOptions> {
        let options = match scope {
            PoolScope::Server => {
                let mut options = parse_connect_options(&self.server_url())?
                    .username(&self.admin_username)
                    .password(&self.admin_password);
                if let Some(db) = &self.maintenance_database {
                    options = options.database(db);
                }
                options
            }
            PoolScope::Database(name) => parse_connect_options(&self.uri)?.database(name),
        };

        Ok(options
            .port(self.port())
            .application_name(env!("CARGO_PKG_NAME"))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(
                LevelFilter::Warn,
                Duration::from_secs(DEFAULT_SLOW_STATEMENT_SECS),
            ))
    }
}

impl TryFrom<RawDatabaseSettings> for DatabaseSettings {
    type Error = DbError;

    fn try_from(raw: RawDatabaseSettings) -> DbResult<Self> {
        Self::from_raw(raw)
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("name", &self.name)
            .field("uri", &self.complete_uri())
            .field("admin_uri", &self.admin_uri())
            .field("mode", &self.mode)
            .field("pool_size", &self.pool_size)
            .field("max_overflow", &self.max_overflow)
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
    }
}

/// Parse and validate a database URI, returning it with the database name.
fn parse_uri(uri: &str) -> DbResult<(Url, String)> {
    let url = Url::parse(uri)
        .map_err(|e| DbError::configuration("uri", format!("Input should be a valid URL, {e}")))?;

    let scheme = url.scheme().to_ascii_lowercase();
    if !scheme_allowed(&scheme) {
        let expected = ALLOWED_SCHEMES
            .iter()
            .map(|s| format!("{s}://"))
            .chain(std::iter::once(format!("{DRIVER_SCHEME}+<driver>://")))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DbError::configuration(
            "uri",
            format!("URI must start with one of: {expected} (got '{scheme}://')"),
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(DbError::configuration("uri", "URI must include a host"));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let db_name = match segments.as_slice() {
        [db] => percent_decode_str(db)
            .decode_utf8()
            .map_err(|_| {
                DbError::configuration("uri", "database name in URI is not valid UTF-8")
            })?
            .into_owned(),
        [] => {
            return Err(DbError::configuration(
                "uri",
                "URI must include a database name in its path",
            ));
        }
        _ => {
            return Err(DbError::configuration(
                "uri",
                format!("URI path must be a single database name, got '{}'", url.path()),
            ));
        }
    };

    Ok((url, db_name))
}

/// `postgres`, `postgresql`, or `postgresql+<driver>` with an alphanumeric driver.
fn scheme_allowed(scheme: &str) -> bool {
    match scheme.split_once('+') {
        None => ALLOWED_SCHEMES.contains(&scheme),
        Some((base, driver)) => {
            base == DRIVER_SCHEME
                && !driver.is_empty()
                && driver.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
    }
}

fn parse_connect_options(url: &Url) -> DbResult<PgConnectOptions> {
    let mut url = url.clone();
    if url.scheme() != DRIVER_SCHEME && url.set_scheme(DRIVER_SCHEME).is_err() {
        return Err(DbError::configuration(
            "uri",
            format!("cannot connect using scheme '{}'", url.scheme()),
        ));
    }
    PgConnectOptions::from_str(url.as_str()).map_err(|e| {
        DbError::configuration("uri", format!("URI not accepted by the driver: {e}"))
    })
}

fn mask(url: &Url) -> String {
    let mut masked = url.clone();
    if masked.password().is_some() {
        let _ = masked.set_password(Some(MASK));
    }
    masked.to_string()
}

fn checked_port(value: i64) -> DbResult<u16> {
    let port = checked_u32("default_port", value, 1)?;
    u16::try_from(port)
        .map_err(|_| DbError::configuration("default_port", format!("value {value} is too large")))
}

fn checked_u32(field: &str, value: i64, min: i64) -> DbResult<u32> {
    if value < min {
        let constraint = if min == 0 {
            "Input should be greater than or equal to 0"
        } else {
            "Input should be greater than 0"
        };
        return Err(DbError::configuration(field, constraint));
    }
    u32::try_from(value)
        .map_err(|_| DbError::configuration(field, format!("value {value} is too large")))
}

/// Settings for a group of databases sharing one administrative identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDatasourceSettings {
    pub name: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Extra attempts `connect_all` makes for a database after a retryable failure.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: i64,
    #[serde(default)]
    pub databases: Vec<RawDatabaseSettings>,
}

/// Validated datasource: every database carries the datasource's admin identity
/// and connection timeout, and database names are unique.
#[derive(Debug, Clone)]
pub struct DatasourceSettings {
    name: String,
    admin_username: String,
    connection_timeout: Duration,
    retry_attempts: u32,
    databases: Vec<DatabaseSettings>,
}

impl DatasourceSettings {
    pub fn new(
        name: impl Into<String>,
        admin_username: &str,
        admin_password: &str,
        databases: Vec<DatabaseSettings>,
    ) -> DbResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DbError::configuration("name", "datasource name cannot be empty"));
        }
        if admin_username.is_empty() {
            return Err(DbError::configuration(
                "admin_username",
                "admin username cannot be empty",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for db in &databases {
            if !seen.insert(db.name().to_string()) {
                return Err(DbError::configuration(
                    "databases",
                    format!("duplicate database name '{}'", db.name()),
                ));
            }
        }

        Ok(Self {
            name,
            admin_username: admin_username.to_string(),
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            databases: databases
                .into_iter()
                .map(|db| db.with_admin_identity(admin_username, admin_password))
                .collect(),
        })
    }

    pub fn from_raw(raw: RawDatasourceSettings) -> DbResult<Self> {
        let databases = raw
            .databases
            .into_iter()
            .map(DatabaseSettings::from_raw)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(
            Self::new(raw.name, &raw.admin_username, &raw.admin_password, databases)?
                .with_connection_timeout(Duration::from_secs(raw.connection_timeout))?
                .with_retry_attempts(checked_u32("retry_attempts", raw.retry_attempts, 0)?),
        )
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Apply one connection timeout to the datasource and every database in it.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> DbResult<Self> {
        self.databases = self
            .databases
            .into_iter()
            .map(|db| db.with_connection_timeout(timeout))
            .collect::<DbResult<Vec<_>>>()?;
        self.connection_timeout = timeout;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    pub fn databases(&self) -> &[DatabaseSettings] {
        &self.databases
    }

    pub(crate) fn into_databases(self) -> Vec<DatabaseSettings> {
        self.databases
    }
}

impl TryFrom<RawDatasourceSettings> for DatasourceSettings {
    type Error = DbError;

    fn try_from(raw: RawDatasourceSettings) -> DbResult<Self> {
        Self::from_raw(raw)
    }
}

/// A `--database` argument: `uri` or `name=uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseArg {
    pub name: Option<String>,
    pub uri: String,
}

impl DatabaseArg {
    /// Parse a database argument.
    ///
    /// # Format
    ///
    /// - `uri` - named after the database in the URI path
    /// - `name=uri` - explicit name (only if '=' appears before '://')
    pub fn parse(s: &str) -> Result<Self, String> {
        let scheme_pos = s.find("://").unwrap_or(s.len());
        let (name, uri) = match s[..scheme_pos].find('=') {
            Some(idx) => (Some(s[..idx].trim().to_string()), &s[idx + 1..]),
            None => (None, s),
        };

        if name.as_deref().is_some_and(str::is_empty) {
            return Err("Database name before '=' cannot be empty".to_string());
        }

        Ok(Self {
            name,
            uri: uri.to_string(),
        })
    }
}

/// Operation to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check whether a database exists on the server
    Exists {
        /// Database name (default: the one in the URI)
        name: Option<String>,
    },
    /// Create a database if it does not exist
    Create {
        /// Database name (default: the one in the URI)
        name: Option<String>,
    },
    /// Drop a database if it exists, terminating its connections first
    Drop {
        /// Database name (default: the one in the URI)
        name: Option<String>,
    },
    /// Count the rows a query returns
    Count {
        /// SQL query; use :name placeholders for parameters
        #[arg(short, long)]
        query: String,
        /// Parameter binding, NAME=VALUE (repeatable)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// Stream a query's results as JSON lines, one batch per line
    Paginate {
        /// SQL query; use :name placeholders for parameters
        #[arg(short, long)]
        query: String,
        /// Parameter binding, NAME=VALUE (repeatable)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Rows per batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: u32,
    },
}

/// Configuration for the pgutils binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pgutils",
    about = "PostgreSQL datasource utilities: database lifecycle and batched pagination",
    version,
    author
)]
pub struct Config {
    /// Database URIs. Format: "uri" or "name=uri".
    /// Can be specified multiple times; all share the admin identity.
    #[arg(
        short = 'd',
        long = "database",
        value_name = "URI",
        env = "PGUTILS_DATABASE",
        value_delimiter = ',',
        required = true
    )]
    pub databases: Vec<String>,

    /// Which configured database to operate on (default: the first)
    #[arg(long, env = "PGUTILS_TARGET")]
    pub target: Option<String>,

    /// Administrative username for server-scope operations
    #[arg(long, default_value = DEFAULT_ADMIN_USERNAME, env = "PGUTILS_ADMIN_USERNAME")]
    pub admin_username: String,

    /// Administrative password for server-scope operations
    #[arg(
        long,
        default_value = DEFAULT_ADMIN_PASSWORD,
        env = "PGUTILS_ADMIN_PASSWORD",
        hide_env_values = true
    )]
    pub admin_password: String,

    /// Persistent connections per pool
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "PGUTILS_POOL_SIZE")]
    pub pool_size: u32,

    /// Extra connections allowed beyond pool_size
    #[arg(long, default_value_t = DEFAULT_MAX_OVERFLOW, env = "PGUTILS_MAX_OVERFLOW")]
    pub max_overflow: u32,

    /// Connection acquire timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECTION_TIMEOUT_SECS,
        env = "PGUTILS_CONNECTION_TIMEOUT"
    )]
    pub connection_timeout: u64,

    /// Use the blocking API instead of the async one
    #[arg(long, env = "PGUTILS_BLOCKING")]
    pub blocking: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PGUTILS_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "PGUTILS_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Execution mode selected on the command line.
    pub fn mode(&self) -> ExecutionMode {
        if self.blocking {
            ExecutionMode::Blocking
        } else {
            ExecutionMode::NonBlocking
        }
    }

    /// Build validated datasource settings from the command line.
    pub fn datasource_settings(&self) -> DbResult<DatasourceSettings> {
        let timeout = Duration::from_secs(self.connection_timeout);
        let databases = self
            .databases
            .iter()
            .map(|arg| {
                let arg = DatabaseArg::parse(arg).map_err(|e| DbError::configuration("database", e))?;
                let mut settings =
                    DatabaseSettings::new(&arg.uri, &self.admin_username, &self.admin_password)?
                        .with_mode(self.mode())
                        .with_pool_size(self.pool_size)?
                        .with_max_overflow(self.max_overflow);
                if let Some(name) = arg.name {
                    settings = settings.with_name(name)?;
                }
                Ok(settings)
            })
            .collect::<DbResult<Vec<_>>>()?;

        DatasourceSettings::new(
            "cli",
            &self.admin_username,
            &self.admin_password,
            databases,
        )?
        .with_connection_timeout(timeout)
    }

    /// Name of the database the command targets.
    pub fn target_name(&self, settings: &DatasourceSettings) -> DbResult<String> {
        match &self.target {
            Some(target) => Ok(target.clone()),
            None => settings
                .databases()
                .first()
                .map(|db| db.name().to_string())
                .ok_or_else(|| DbError::configuration("database", "no database configured")),
        }
    }
}

/// Parse `NAME=VALUE` parameter bindings.
pub fn parse_params(pairs: &[String]) -> DbResult<crate::models::QueryParams> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                DbError::invalid_input(format!("Parameter '{pair}' must be NAME=VALUE"))
            })?;
            let name = name.trim().trim_start_matches(':');
            if name.is_empty() {
                return Err(DbError::invalid_input(format!(
                    "Parameter '{pair}' has an empty name"
                )));
            }
            Ok((name.to_string(), crate::models::QueryParam::infer(value)))
        })
        .collect()
}

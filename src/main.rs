//! pgutils - Main entry point.
//!
//! Command-line front end for the library: database lifecycle operations and
//! batched query output as JSON lines. `--blocking` drives the blocking API,
//! otherwise the async API runs on a tokio runtime.

use clap::Parser;
use futures_util::StreamExt;
use pgutils::config::{Command, Config, parse_params};
use pgutils::db::blocking;
use pgutils::db::{DatabaseManager, DatasourceRegistry, Paginator};
use pgutils::error::{DbError, DbResult};
use pgutils::models::{Batch, ExecutionMode};
use serde_json::{Value as JsonValue, json};
use std::io::Write;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so that stdout carries only JSON output.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        mode = %config.mode(),
        "Starting pgutils v{}",
        env!("CARGO_PKG_VERSION")
    );

    let result = match config.mode() {
        ExecutionMode::Blocking => run_blocking(&config),
        ExecutionMode::NonBlocking => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(run_async(&config)),
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {suggestion}");
        }
        return Err(e.into());
    }

    Ok(())
}

async fn run_async(config: &Config) -> DbResult<()> {
    let settings = config.datasource_settings()?;
    let target = config.target_name(&settings)?;
    let registry = DatasourceRegistry::new(settings)?;
    let manager = registry.get(&target)?;

    let result = dispatch_async(&manager, &config.command).await;
    let closed = registry.disconnect_all().await;
    result.and(closed)
}

async fn dispatch_async(manager: &DatabaseManager, command: &Command) -> DbResult<()> {
    let default_name = manager.settings().db_name();
    match command {
        Command::Exists { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let exists = manager.database_exists(name).await?;
            emit(&json!({ "database": name, "exists": exists }))
        }
        Command::Create { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let created = manager.create_database_if_not_exists(name).await?;
            emit(&json!({ "database": name, "created": created }))
        }
        Command::Drop { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let dropped = manager.drop_database_if_exists(name).await?;
            emit(&json!({ "database": name, "dropped": dropped }))
        }
        Command::Count { query, params } => {
            let paginator = build_paginator(query, params, None)?;
            let mut conn = manager.get_connection().await?;
            let total = paginator.total_count(&mut conn).await?;
            emit(&json!({ "total": total }))
        }
        Command::Paginate {
            query,
            params,
            batch_size,
        } => {
            let paginator = build_paginator(query, params, Some(*batch_size))?;
            let mut conn = manager.get_connection().await?;
            let mut pages = std::pin::pin!(paginator.paginate(&mut conn));
            let mut index = 0usize;
            while let Some(batch) = pages.next().await {
                emit_batch(index, &batch?)?;
                index += 1;
            }
            info!(batches = index, "Pagination complete");
            Ok(())
        }
    }
}

fn run_blocking(config: &Config) -> DbResult<()> {
    let settings = config.datasource_settings()?;
    let target = config.target_name(&settings)?;
    let registry = blocking::Registry::new(settings)?;
    let database = registry.get(&target)?;

    let result = dispatch_blocking(&database, &config.command);
    let closed = registry.disconnect_all();
    result.and(closed)
}

fn dispatch_blocking(database: &blocking::Database, command: &Command) -> DbResult<()> {
    let default_name = database.settings().db_name();
    match command {
        Command::Exists { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let exists = database.database_exists(name)?;
            emit(&json!({ "database": name, "exists": exists }))
        }
        Command::Create { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let created = database.create_database_if_not_exists(name)?;
            emit(&json!({ "database": name, "created": created }))
        }
        Command::Drop { name } => {
            let name = name.as_deref().unwrap_or(default_name);
            let dropped = database.drop_database_if_exists(name)?;
            emit(&json!({ "database": name, "dropped": dropped }))
        }
        Command::Count { query, params } => {
            let paginator = build_paginator(query, params, None)?;
            let mut conn = database.get_connection()?;
            let total = paginator.total_count_blocking(&mut conn)?;
            emit(&json!({ "total": total }))
        }
        Command::Paginate {
            query,
            params,
            batch_size,
        } => {
            let paginator = build_paginator(query, params, Some(*batch_size))?;
            let mut conn = database.get_connection()?;
            let mut index = 0usize;
            for batch in paginator.paginate_blocking(&mut conn) {
                emit_batch(index, &batch?)?;
                index += 1;
            }
            info!(batches = index, "Pagination complete");
            Ok(())
        }
    }
}

fn build_paginator(query: &str, params: &[String], batch_size: Option<u32>) -> DbResult<Paginator> {
    let paginator = Paginator::new(query)?.with_params(parse_params(params)?)?;
    match batch_size {
        Some(size) => paginator.with_batch_size(size),
        None => Ok(paginator),
    }
}

fn emit_batch(index: usize, batch: &Batch) -> DbResult<()> {
    emit(&json!({ "batch": index, "rows": batch }))
}

/// Write one JSON value as a line on stdout.
fn emit(value: &JsonValue) -> DbResult<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{value}").map_err(|e| DbError::internal(format!("Failed to write output: {e}")))
}

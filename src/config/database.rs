//! Database configuration module.
//!
//! Handles the storage session lifecycle: connecting (with a bounded startup retry),
//! creating tables from the entity definitions, and closing the pool on shutdown.
//! Tables are generated with `Schema::create_table_from_entity`, so the foreign keys
//! declared on the entities (`ON DELETE RESTRICT`) are part of the schema.

use crate::config::app::DatabaseConfig;
use crate::entities::{Product, Supplier, Transaction};
use crate::errors::{Error, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// Opens a connection pool for `url` and verifies it with a ping.
pub async fn create_connection(url: &str) -> Result<DatabaseConnection> {
    create_pool(url, None).await
}

/// Like [`create_connection`], capping the pool at `max_connections` when given.
pub async fn create_pool(url: &str, max_connections: Option<u32>) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(false);
    if let Some(max) = max_connections {
        options.max_connections(max);
    }

    let db = Database::connect(options).await?;
    db.ping().await?;
    Ok(db)
}

/// Startup supervisor: tries to connect up to `connect_attempts` times, waiting
/// `retry_delay_ms` between attempts.
///
/// # Errors
/// Returns the last connection error once all attempts are exhausted.
#[instrument(skip(config), fields(attempts = config.connect_attempts))]
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    prepare_sqlite_dir(&config.url)?;
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;
    loop {
        info!("Connecting to database (attempt {attempt}/{attempts})");
        match create_pool(&config.url, config.max_connections).await {
            Ok(db) => {
                info!("Database connected");
                return Ok(db);
            }
            Err(e) if attempt < attempts => {
                warn!("Database connection attempt {attempt} failed: {e}");
                tokio::time::sleep(config.retry_delay()).await;
                attempt += 1;
            }
            Err(e) => {
                error!("Database unreachable after {attempts} attempts: {e}");
                return Err(e);
            }
        }
    }
}

/// Creates the directory of a file-backed `SQLite` URL, so `mode=rwc` can create the file.
fn prepare_sqlite_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if let Some(dir) = Path::new(file).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Creates all necessary database tables if they do not exist yet.
///
/// Order matters: suppliers before products before transactions, so every
/// foreign key points at an existing table.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut supplier_table = schema.create_table_from_entity(Supplier);
    let mut product_table = schema.create_table_from_entity(Product);
    let mut transaction_table = schema.create_table_from_entity(Transaction);

    supplier_table.if_not_exists();
    product_table.if_not_exists();
    transaction_table.if_not_exists();

    db.execute(builder.build(&supplier_table)).await?;
    db.execute(builder.build(&product_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;

    Ok(())
}

/// Closes the connection pool, waiting for in-flight queries to finish.
pub async fn close(db: DatabaseConnection) -> Result<()> {
    db.close().await.map_err(Error::from)?;
    info!("Database connection closed");
    Ok(())
}

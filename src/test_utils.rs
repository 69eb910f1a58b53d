//! Shared test utilities for the inventory ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        ledger::{NewTransaction, StockLedger},
        product::{self, NewProduct},
        supplier::{self, NewSupplier},
    },
    entities::{self, TransactionKind},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::path::{Path, PathBuf};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in the temp dir behind a pool of
/// `max_connections`, so statements really run on separate connections.
/// Pair with [`remove_file_db`].
pub async fn setup_file_db(max_connections: u32) -> Result<(DatabaseConnection, PathBuf)> {
    let path = std::env::temp_dir().join(format!("inventory-ledger-{}.sqlite", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = crate::config::database::create_pool(&url, Some(max_connections)).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, path))
}

/// Deletes a database made by [`setup_file_db`] along with its journal files.
pub fn remove_file_db(path: &Path) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

/// Creates a test supplier with sensible defaults.
///
/// # Defaults
/// * `contact`: "Test Contact"
/// * `email`, `phone`, `address`: None
pub async fn create_test_supplier(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::supplier::Model> {
    supplier::create_supplier(
        db,
        NewSupplier {
            name: name.to_string(),
            contact: "Test Contact".to_string(),
            email: None,
            phone: None,
            address: None,
        },
    )
    .await
}

/// Creates a test product with zero stock.
///
/// # Defaults
/// * `category`: "General"
/// * `price`: 10.0
pub async fn create_test_product(
    db: &DatabaseConnection,
    supplier_id: &str,
    name: &str,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        NewProduct {
            name: name.to_string(),
            category: "General".to_string(),
            price: 10.0,
            supplier_id: supplier_id.to_string(),
        },
    )
    .await
}

/// Fresh database, a ledger over it, and one product with zero stock.
pub async fn setup_with_product()
-> Result<(DatabaseConnection, StockLedger, entities::product::Model)> {
    let db = setup_test_db().await?;
    let supplier = create_test_supplier(&db, "Test Supplier").await?;
    let product = create_test_product(&db, &supplier.id, "Test Product").await?;
    let ledger = StockLedger::new(db.clone());
    Ok((db, ledger, product))
}

/// The business date used by test transactions.
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default()
}

/// Records a purchase of `quantity` units dated [`test_date`].
pub async fn purchase(
    ledger: &StockLedger,
    product_id: &str,
    quantity: i64,
) -> Result<entities::transaction::Model> {
    record(ledger, product_id, quantity, TransactionKind::Purchase).await
}

/// Records a sale of `quantity` units dated [`test_date`].
pub async fn sale(
    ledger: &StockLedger,
    product_id: &str,
    quantity: i64,
) -> Result<entities::transaction::Model> {
    record(ledger, product_id, quantity, TransactionKind::Sale).await
}

async fn record(
    ledger: &StockLedger,
    product_id: &str,
    quantity: i64,
    kind: TransactionKind,
) -> Result<entities::transaction::Model> {
    ledger
        .apply(NewTransaction {
            product_id: product_id.to_string(),
            quantity,
            kind,
            date: test_date(),
            notes: None,
        })
        .await
}

/// Reads a product's current stock straight from the database.
pub async fn stock_of(db: &DatabaseConnection, product_id: &str) -> Result<i64> {
    product::get_product_by_id(db, product_id)
        .await?
        .map(|p| p.stock)
        .ok_or_else(|| Error::not_found("Product", product_id))
}

//! Seed data loading from config.toml
//!
//! Suppliers and products listed under `[[seed.suppliers]]` and `[[seed.products]]`
//! populate an empty database on first run. Opening stock is booked through the
//! stock ledger as a purchase, so stock matches history from the first row.

use crate::{
    core::{
        ledger::{NewTransaction, StockLedger},
        product::{NewProduct, create_product},
        supplier::{NewSupplier, create_supplier, get_all_suppliers},
    },
    entities::TransactionKind,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

/// Notes attached to the purchase that books a seeded product's opening stock
pub const OPENING_BALANCE_NOTE: &str = "Opening balance";

/// Initial data applied to an empty database
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub suppliers: Vec<SeedSupplier>,
    pub products: Vec<SeedProduct>,
}

/// Configuration for a single supplier
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSupplier {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Configuration for a single product
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
    /// Name of a supplier from `[[seed.suppliers]]`
    pub supplier: String,
    /// Units on hand when the ledger starts
    #[serde(default)]
    pub opening_stock: i64,
}

impl SeedConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty() && self.products.is_empty()
    }
}

/// Seeds suppliers and products, but only into a database without suppliers.
///
/// Returns `true` if anything was written.
///
/// # Errors
/// Returns an error if:
/// - A product names a supplier that is not in the seed list
/// - A seeded value fails validation
/// - The database operation fails
pub async fn seed_inventory(
    db: &DatabaseConnection,
    ledger: &StockLedger,
    seed: &SeedConfig,
) -> Result<bool> {
    if seed.is_empty() {
        return Ok(false);
    }
    if !get_all_suppliers(db).await?.is_empty() {
        info!("Database already has suppliers, skipping seed data");
        return Ok(false);
    }

    let mut supplier_ids: HashMap<&str, String> = HashMap::new();
    for s in &seed.suppliers {
        let created = create_supplier(
            db,
            NewSupplier {
                name: s.name.clone(),
                contact: s.contact.clone(),
                email: s.email.clone(),
                phone: s.phone.clone(),
                address: s.address.clone(),
            },
        )
        .await?;
        supplier_ids.insert(s.name.as_str(), created.id);
    }

    let today = chrono::Utc::now().date_naive();
    for p in &seed.products {
        let supplier_id = supplier_ids
            .get(p.supplier.as_str())
            .cloned()
            .ok_or_else(|| Error::Config {
                message: format!(
                    "Seed product '{}' refers to unknown supplier '{}'",
                    p.name, p.supplier
                ),
            })?;
        let product = create_product(
            db,
            NewProduct {
                name: p.name.clone(),
                category: p.category.clone(),
                price: p.price,
                supplier_id,
            },
        )
        .await?;

        if p.opening_stock > 0 {
            ledger
                .apply(NewTransaction {
                    product_id: product.id,
                    quantity: p.opening_stock,
                    kind: TransactionKind::Purchase,
                    date: today,
                    notes: Some(OPENING_BALANCE_NOTE.to_string()),
                })
                .await?;
        }
    }

    info!(
        suppliers = seed.suppliers.len(),
        products = seed.products.len(),
        "Seed data applied"
    );
    Ok(true)
}

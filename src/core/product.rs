//! Product business logic - Handles all product-related operations.
//!
//! This module provides functions for creating, retrieving, updating, and deleting
//! products. Stock is not part of any input here: new products start at zero and
//! only the stock ledger moves stock afterwards. A product with recorded
//! transactions cannot be deleted.

use crate::{
    core::supplier::{get_supplier_by_id, referenced, required},
    entities::{Product, Supplier, Transaction, product, supplier, transaction},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fields for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub supplier_id: String,
}

/// Partial product edit. Stock is deliberately absent; unknown fields are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub supplier_id: Option<String>,
}

/// A product joined with its supplier's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub supplier_name: Option<String>,
}

impl From<(product::Model, Option<supplier::Model>)> for ProductView {
    fn from((product, supplier): (product::Model, Option<supplier::Model>)) -> Self {
        Self {
            product,
            supplier_name: supplier.map(|s| s.name),
        }
    }
}

/// Retrieves all products with supplier names, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_products(db: &DatabaseConnection) -> Result<Vec<ProductView>> {
    Ok(Product::find()
        .find_also_related(Supplier)
        .order_by_asc(product::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(ProductView::from)
        .collect())
}

/// Retrieves a specific product by its unique ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: &str,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product together with its supplier's name.
pub async fn get_product_view(
    db: &DatabaseConnection,
    product_id: &str,
) -> Result<Option<ProductView>> {
    Ok(Product::find_by_id(product_id)
        .find_also_related(Supplier)
        .one(db)
        .await?
        .map(ProductView::from))
}

/// Retrieves products whose stock is below `threshold`, lowest stock first.
pub async fn get_low_stock_products(
    db: &DatabaseConnection,
    threshold: i64,
) -> Result<Vec<ProductView>> {
    Ok(Product::find()
        .filter(product::Column::Stock.lt(threshold))
        .find_also_related(Supplier)
        .order_by_asc(product::Column::Stock)
        .order_by_asc(product::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(ProductView::from)
        .collect())
}

/// Creates a new product with zero stock.
///
/// # Errors
/// Returns an error if:
/// - The name or category is empty or whitespace-only
/// - The price is negative or not finite (NaN, infinity)
/// - The supplier does not exist
/// - The database insert operation fails
pub async fn create_product(db: &DatabaseConnection, new: NewProduct) -> Result<product::Model> {
    let name = required("Product name", &new.name)?;
    let category = required("Product category", &new.category)?;
    validate_price(new.price)?;
    ensure_supplier(db, &new.supplier_id).await?;

    let now = chrono::Utc::now();
    let product = product::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(name),
        category: Set(category),
        price: Set(new.price),
        stock: Set(0),
        supplier_id: Set(new.supplier_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok(product)
}

/// Applies a partial edit to a product's descriptive fields.
///
/// Only the columns being changed are written, so a concurrent stock movement
/// is never overwritten.
///
/// # Errors
/// Returns an error if:
/// - The product or the new supplier does not exist
/// - A new name or category is blank, or a new price is negative or not finite
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: &str,
    changes: ProductChanges,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?
        .into();

    if let Some(name) = changes.name {
        product.name = Set(required("Product name", &name)?);
    }
    if let Some(category) = changes.category {
        product.category = Set(required("Product category", &category)?);
    }
    if let Some(price) = changes.price {
        validate_price(price)?;
        product.price = Set(price);
    }
    if let Some(supplier_id) = changes.supplier_id {
        ensure_supplier(db, &supplier_id).await?;
        product.supplier_id = Set(supplier_id);
    }
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Deletes a product that has no recorded transactions.
///
/// # Errors
/// Returns `NotFound` if the product does not exist and `ConstraintViolation`
/// while any transaction references it.
pub async fn delete_product(db: &DatabaseConnection, product_id: &str) -> Result<product::Model> {
    let product = get_product_by_id(db, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;

    let history = Transaction::find()
        .filter(transaction::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    if history > 0 {
        return Err(Error::constraint(format!(
            "Cannot delete product with existing transactions ({history} recorded)"
        )));
    }

    Product::delete_by_id(product_id)
        .exec(db)
        .await
        .map_err(referenced("Cannot delete product with existing transactions"))?;

    info!(product_id, "Product deleted");
    Ok(product)
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::validation(format!(
            "Price must be a non-negative number, got {price}"
        )));
    }
    Ok(())
}

async fn ensure_supplier(db: &DatabaseConnection, supplier_id: &str) -> Result<()> {
    get_supplier_by_id(db, supplier_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::not_found("Supplier", supplier_id))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn new_product(name: &str, price: f64, supplier_id: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: "Hardware".to_string(),
            price,
            supplier_id: supplier_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_product(&db, new_product("", 10.0, "s1")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_product(&db, new_product("Bolt", -1.0, "s1")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_product(&db, new_product("Bolt", f64::NAN, "s1")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_product(&db, new_product("Bolt", f64::INFINITY, "s1")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_starts_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let supplier = create_test_supplier(&db, "Acme").await?;

        let product = create_product(&db, new_product(" Bolt ", 0.25, &supplier.id)).await?;
        assert_eq!(product.name, "Bolt");
        assert_eq!(product.stock, 0);
        assert_eq!(product.price, 0.25);

        let view = get_product_view(&db, &product.id).await?.unwrap();
        assert_eq!(view.supplier_name.as_deref(), Some("Acme"));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_unknown_supplier() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_product(&db, new_product("Bolt", 1.0, "missing")).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "Supplier",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_keeps_stock() -> Result<()> {
        let (db, ledger, product) = setup_with_product().await?;
        purchase(&ledger, &product.id, 8).await?;

        let updated = update_product(
            &db,
            &product.id,
            ProductChanges {
                price: Some(12.5),
                category: Some("Tools".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.price, 12.5);
        assert_eq!(updated.category, "Tools");
        assert_eq!(updated.stock, 8);

        let result = update_product(
            &db,
            &product.id,
            ProductChanges {
                supplier_id: Some("missing".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[test]
    fn test_stock_is_not_an_editable_field() {
        let parsed: std::result::Result<ProductChanges, _> =
            serde_json::from_str(r#"{"name":"Bolt","stock":500}"#);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_delete_product_with_history_is_blocked() -> Result<()> {
        let (db, ledger, product) = setup_with_product().await?;
        purchase(&ledger, &product.id, 1).await?;

        let result = delete_product(&db, &product.id).await;
        assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
        assert!(get_product_by_id(&db, &product.id).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product_without_history() -> Result<()> {
        let (db, _ledger, product) = setup_with_product().await?;

        let deleted = delete_product(&db, &product.id).await?;
        assert_eq!(deleted.id, product.id);
        assert!(get_product_by_id(&db, &product.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_products_sorted() -> Result<()> {
        let (db, ledger, first) = setup_with_product().await?;
        let second = create_test_product(&db, &first.supplier_id, "Second").await?;
        let third = create_test_product(&db, &first.supplier_id, "Third").await?;
        purchase(&ledger, &first.id, 7).await?;
        purchase(&ledger, &second.id, 2).await?;
        purchase(&ledger, &third.id, 30).await?;

        let low: Vec<String> = get_low_stock_products(&db, 10)
            .await?
            .into_iter()
            .map(|v| v.product.id)
            .collect();
        assert_eq!(low, [second.id, first.id]);

        Ok(())
    }
}

//! Supplier business logic - Handles all supplier-related operations.
//!
//! Provides functions for creating, retrieving, updating, and deleting suppliers.
//! A supplier that still has products cannot be deleted.

use crate::{
    entities::{Product, Supplier, product, supplier},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, SqlErr, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Fields for a new supplier.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial supplier edit. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierChanges {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Retrieves all suppliers, ordered alphabetically by name.
pub async fn get_all_suppliers(db: &DatabaseConnection) -> Result<Vec<supplier::Model>> {
    Supplier::find()
        .order_by_asc(supplier::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a supplier by id, returning None if it does not exist.
pub async fn get_supplier_by_id(
    db: &DatabaseConnection,
    supplier_id: &str,
) -> Result<Option<supplier::Model>> {
    Supplier::find_by_id(supplier_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a supplier by exact name.
pub async fn get_supplier_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<supplier::Model>> {
    Supplier::find()
        .filter(supplier::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a supplier. Name and contact are required and trimmed.
///
/// # Errors
/// Returns `Validation` if name or contact is blank.
pub async fn create_supplier(
    db: &DatabaseConnection,
    new: NewSupplier,
) -> Result<supplier::Model> {
    let name = required("Supplier name", &new.name)?;
    let contact = required("Supplier contact", &new.contact)?;
    let now = chrono::Utc::now();

    let supplier = supplier::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(name),
        contact: Set(contact),
        email: Set(new.email),
        phone: Set(new.phone),
        address: Set(new.address),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier created");
    Ok(supplier)
}

/// Applies a partial edit to a supplier.
///
/// # Errors
/// Returns `NotFound` if the supplier does not exist, `Validation` if a required
/// field is set to a blank value.
pub async fn update_supplier(
    db: &DatabaseConnection,
    supplier_id: &str,
    changes: SupplierChanges,
) -> Result<supplier::Model> {
    let mut supplier: supplier::ActiveModel = get_supplier_by_id(db, supplier_id)
        .await?
        .ok_or_else(|| Error::not_found("Supplier", supplier_id))?
        .into();

    if let Some(name) = changes.name {
        supplier.name = Set(required("Supplier name", &name)?);
    }
    if let Some(contact) = changes.contact {
        supplier.contact = Set(required("Supplier contact", &contact)?);
    }
    if let Some(email) = changes.email {
        supplier.email = Set(Some(email));
    }
    if let Some(phone) = changes.phone {
        supplier.phone = Set(Some(phone));
    }
    if let Some(address) = changes.address {
        supplier.address = Set(Some(address));
    }
    supplier.updated_at = Set(chrono::Utc::now());

    supplier.update(db).await.map_err(Into::into)
}

/// Deletes a supplier that no product references.
///
/// # Errors
/// Returns `NotFound` if the supplier does not exist and `ConstraintViolation`
/// while any product still references it.
pub async fn delete_supplier(
    db: &DatabaseConnection,
    supplier_id: &str,
) -> Result<supplier::Model> {
    let supplier = get_supplier_by_id(db, supplier_id)
        .await?
        .ok_or_else(|| Error::not_found("Supplier", supplier_id))?;

    let product_count = Product::find()
        .filter(product::Column::SupplierId.eq(supplier_id))
        .count(db)
        .await?;
    if product_count > 0 {
        return Err(Error::constraint(format!(
            "Cannot delete supplier with existing products ({product_count} remaining)"
        )));
    }

    Supplier::delete_by_id(supplier_id)
        .exec(db)
        .await
        .map_err(referenced("Cannot delete supplier with existing products"))?;

    info!(supplier_id, "Supplier deleted");
    Ok(supplier)
}

pub(crate) fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Turns a foreign key failure raised by the database into a constraint violation.
pub(crate) fn referenced(message: &'static str) -> impl Fn(DbErr) -> Error {
    move |err| match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => Error::constraint(message),
        _ => Error::Database(err),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn new_supplier(name: &str, contact: &str) -> NewSupplier {
        NewSupplier {
            name: name.to_string(),
            contact: contact.to_string(),
            email: None,
            phone: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_create_supplier_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_supplier(&db, new_supplier("", "Jane")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_supplier(&db, new_supplier("Acme", "   ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_list_suppliers() -> Result<()> {
        let db = setup_test_db().await?;

        let zed = create_supplier(&db, new_supplier("  Zed Parts ", "Zoe")).await?;
        assert_eq!(zed.name, "Zed Parts");
        create_test_supplier(&db, "Acme").await?;

        let names: Vec<String> = get_all_suppliers(&db)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["Acme", "Zed Parts"]);

        let found = get_supplier_by_name(&db, "Zed Parts").await?.unwrap();
        assert_eq!(found, zed);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_supplier_partial() -> Result<()> {
        let db = setup_test_db().await?;
        let supplier = create_test_supplier(&db, "Acme").await?;

        let updated = update_supplier(
            &db,
            &supplier.id,
            SupplierChanges {
                email: Some("orders@acme.test".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.email.as_deref(), Some("orders@acme.test"));

        let result = update_supplier(
            &db,
            &supplier.id,
            SupplierChanges {
                name: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = update_supplier(&db, "missing", SupplierChanges::default()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_supplier_blocked_by_products() -> Result<()> {
        let (db, _ledger, product) = setup_with_product().await?;

        let result = delete_supplier(&db, &product.supplier_id).await;
        assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
        assert!(get_supplier_by_id(&db, &product.supplier_id).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_unreferenced_supplier() -> Result<()> {
        let db = setup_test_db().await?;
        let supplier = create_test_supplier(&db, "Acme").await?;

        let deleted = delete_supplier(&db, &supplier.id).await?;
        assert_eq!(deleted.id, supplier.id);
        assert!(get_supplier_by_id(&db, &supplier.id).await?.is_none());

        let result = delete_supplier(&db, &supplier.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }
}

//! Transaction entity - Represents a stock movement for a single product.
//!
//! Each transaction has a `product_id`, a positive `quantity`, a `kind`
//! (purchase or sale), the business `date`, and optional free-text `notes`.
//! Purchases add `quantity` to the product's stock, sales remove it.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a stock movement.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Inbound inventory
    #[sea_orm(string_value = "purchase")]
    Purchase,
    /// Outbound inventory
    #[sea_orm(string_value = "sale")]
    Sale,
}

impl TransactionKind {
    /// Signed stock effect of moving `quantity` units in this direction.
    #[must_use]
    pub const fn signed(self, quantity: i64) -> i64 {
        match self {
            Self::Purchase => quantity,
            Self::Sale => -quantity,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Sale => "sale",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Opaque unique identifier (UUID string)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// ID of the product whose stock this transaction moves
    pub product_id: String,
    /// Units moved, always positive
    pub quantity: i64,
    /// Purchase or sale
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Business date of the movement
    pub date: Date,
    pub notes: Option<String>,
    /// When the row was first recorded
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Signed stock effect of this transaction.
    #[must_use]
    pub const fn signed_quantity(&self) -> i64 {
        self.kind.signed(self.quantity)
    }
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

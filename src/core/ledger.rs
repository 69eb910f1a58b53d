//! Stock ledger - Keeps every product's stock equal to its transaction history.
//!
//! A product's stock is the signed sum of its transactions (purchases add, sales
//! subtract) and is never negative. The ledger is the only writer of
//! `products.stock`: each create, edit, or delete of a transaction is one atomic
//! unit that moves the row and the stock together, or neither.
//!
//! Operations on the same product are serialized through [`ProductLocks`]; the
//! non-negativity check is re-evaluated inside the database transaction by a
//! conditional `UPDATE ... WHERE stock >= -delta`, so it never runs against a stale
//! value. Operations on different products run in parallel.
//!
//! Removing stock that later sales already consumed (deleting or shrinking a
//! purchase) is rejected with [`Error::ConstraintViolation`].

use crate::{
    core::locks::{ProductGuard, ProductLocks},
    entities::{
        Product, Transaction, product,
        transaction::{self, TransactionKind},
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{
    DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, future::Future, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Fields of a transaction to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTransaction {
    pub product_id: String,
    pub quantity: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial edit of a recorded transaction. Absent fields keep their old value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransactionChanges {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl TransactionChanges {
    fn merge_over(&self, old: &transaction::Model) -> NewTransaction {
        NewTransaction {
            product_id: self
                .product_id
                .clone()
                .unwrap_or_else(|| old.product_id.clone()),
            quantity: self.quantity.unwrap_or(old.quantity),
            kind: self.kind.unwrap_or(old.kind),
            date: self.date.unwrap_or(old.date),
            notes: self.notes.clone().or_else(|| old.notes.clone()),
        }
    }
}

/// A transaction joined with the product it moves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: transaction::Model,
    pub product_name: Option<String>,
    pub product_price: Option<f64>,
}

impl From<(transaction::Model, Option<product::Model>)> for TransactionView {
    fn from((transaction, product): (transaction::Model, Option<product::Model>)) -> Self {
        Self {
            transaction,
            product_name: product.as_ref().map(|p| p.name.clone()),
            product_price: product.map(|p| p.price),
        }
    }
}

/// Stored stock compared with the stock derived from history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockAudit {
    pub recorded: i64,
    pub derived: i64,
    pub transaction_count: usize,
}

impl StockAudit {
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.recorded == self.derived && self.recorded >= 0
    }
}

/// The stock ledger service. Cheap to clone; clones share locks and the pool.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: DatabaseConnection,
    locks: ProductLocks,
    timeout: Option<Duration>,
}

impl StockLedger {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            locks: ProductLocks::new(),
            timeout: None,
        }
    }

    /// Sets a deadline for each operation's lock wait and statements. A unit that
    /// misses it is rolled back; the commit itself is not cut short.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub const fn locks(&self) -> &ProductLocks {
        &self.locks
    }

    /// Records a new transaction and moves the product's stock by its signed quantity.
    ///
    /// # Errors
    /// - `Validation` if the quantity is not positive, the product id is blank, or
    ///   the stock would leave the `i64` range
    /// - `NotFound` if the product does not exist
    /// - `InsufficientStock` if a sale exceeds the current stock
    #[instrument(skip(self, new), fields(product_id = %new.product_id, kind = %new.kind, quantity = new.quantity))]
    pub async fn apply(&self, new: NewTransaction) -> Result<transaction::Model> {
        validate(&new)?;
        let (model, stock) = self.stage_apply(&new).await?.commit().await?;

        info!(transaction_id = %model.id, stock, "Transaction applied");
        Ok(model)
    }

    async fn stage_apply(&self, new: &NewTransaction) -> Result<Staged<(transaction::Model, i64)>> {
        let id = uuid::Uuid::new_v4().to_string();

        self.within_deadline(async {
            let guard = self.locks.acquire([new.product_id.as_str()]).await;
            let txn = self.db.begin().await?;

            let stock = adjust_stock(&txn, &new.product_id, new.kind.signed(new.quantity)).await?;
            let model = transaction::ActiveModel {
                id: Set(id),
                product_id: Set(new.product_id.clone()),
                quantity: Set(new.quantity),
                kind: Set(new.kind),
                date: Set(new.date),
                notes: Set(new.notes.clone()),
                created_at: Set(chrono::Utc::now()),
            }
            .insert(&txn)
            .await?;

            Ok::<_, Error>(Staged::new(guard, txn, (model, stock)))
        })
        .await
    }

    /// Deletes a transaction and reverses its stock effect.
    ///
    /// # Errors
    /// - `NotFound` if the transaction does not exist
    /// - `ConstraintViolation` if reversing a purchase would make stock negative
    #[instrument(skip(self))]
    pub async fn revert(&self, transaction_id: &str) -> Result<transaction::Model> {
        let (removed, stock) = self
            .within_deadline(async {
                let (guard, existing) = self.lock_transaction(transaction_id, None).await?;
                let txn = self.db.begin().await?;

                let stock = adjust_stock(&txn, &existing.product_id, -existing.signed_quantity())
                    .await
                    .map_err(|e| stranded_stock(e, &existing))?;
                Transaction::delete_by_id(existing.id.clone())
                    .exec(&txn)
                    .await?;

                Ok::<_, Error>(Staged::new(guard, txn, (existing, stock)))
            })
            .await?
            .commit()
            .await?;

        info!(product_id = %removed.product_id, stock, "Transaction reverted");
        Ok(removed)
    }

    /// Edits a transaction in place, as one atomic revert-then-apply.
    ///
    /// The reversal of the old row is netted against the new row before the stock
    /// check, so shrinking a sale never fails for lack of stock. On any error the old
    /// row and all stock values are left untouched.
    ///
    /// # Errors
    /// - `Validation` if the new quantity is not positive, the product id is blank,
    ///   or the stock would leave the `i64` range
    /// - `NotFound` if the transaction or the new product does not exist
    /// - `InsufficientStock` if the new sale exceeds the stock left after the reversal
    /// - `ConstraintViolation` if removing the old purchase would make stock negative
    #[instrument(skip(self, changes))]
    pub async fn replace(
        &self,
        transaction_id: &str,
        changes: TransactionChanges,
    ) -> Result<transaction::Model> {
        if let Some(quantity) = changes.quantity {
            validate_quantity(quantity)?;
        }
        if let Some(product_id) = &changes.product_id {
            validate_product_id(product_id)?;
        }

        let updated = self
            .within_deadline(async {
                let (guard, old) = self
                    .lock_transaction(transaction_id, changes.product_id.as_deref())
                    .await?;
                let new = changes.merge_over(&old);
                let deltas = net_deltas([
                    (old.product_id.as_str(), -old.signed_quantity()),
                    (new.product_id.as_str(), new.kind.signed(new.quantity)),
                ])?;

                let txn = self.db.begin().await?;
                for (product_id, delta) in deltas {
                    if delta == 0 {
                        continue;
                    }
                    adjust_stock(&txn, product_id, delta)
                        .await
                        .map_err(|e| classify_replace_failure(e, product_id, &old, &new))?;
                }

                let mut active: transaction::ActiveModel = old.into();
                active.product_id = Set(new.product_id);
                active.quantity = Set(new.quantity);
                active.kind = Set(new.kind);
                active.date = Set(new.date);
                active.notes = Set(new.notes);
                let updated = active.update(&txn).await?;

                Ok::<_, Error>(Staged::new(guard, txn, updated))
            })
            .await?
            .commit()
            .await?;

        info!(transaction_id = %updated.id, "Transaction replaced");
        Ok(updated)
    }

    /// Creates a transaction. Alias of [`StockLedger::apply`].
    pub async fn create_transaction(&self, new: NewTransaction) -> Result<transaction::Model> {
        self.apply(new).await
    }

    /// Deletes a transaction. Alias of [`StockLedger::revert`] that drops the removed row.
    pub async fn delete_transaction(&self, transaction_id: &str) -> Result<()> {
        self.revert(transaction_id).await.map(|_| ())
    }

    /// Updates a transaction. Alias of [`StockLedger::replace`].
    pub async fn update_transaction(
        &self,
        transaction_id: &str,
        changes: TransactionChanges,
    ) -> Result<transaction::Model> {
        self.replace(transaction_id, changes).await
    }

    /// Locks the product(s) a stored transaction touches and returns the row as
    /// read under the lock.
    ///
    /// The row is first read without a lock to learn its product. If a concurrent
    /// edit moved it to another product before the lock was taken, start over.
    /// Once the lock on its product is held the row cannot move or vanish, since
    /// every edit of it needs that same lock.
    async fn lock_transaction(
        &self,
        transaction_id: &str,
        also_product: Option<&str>,
    ) -> Result<(ProductGuard, transaction::Model)> {
        loop {
            let peeked = get_transaction_by_id(&self.db, transaction_id)
                .await?
                .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

            let mut products = vec![peeked.product_id.as_str()];
            products.extend(also_product);
            let guard = self.locks.acquire(products).await;

            let current = get_transaction_by_id(&self.db, transaction_id)
                .await?
                .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

            if current.product_id == peeked.product_id {
                return Ok((guard, current));
            }
            debug!(
                transaction_id,
                "Transaction moved to another product while locking, retrying"
            );
        }
    }

    /// Bounds the lock wait and the statements of an operation. The commit runs
    /// after this returns, so a unit that reached it is never reported as timed out.
    async fn within_deadline<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(after) => tokio::time::timeout(after, operation).await.map_err(|_| {
                warn!(?after, "Ledger operation timed out, rolled back");
                Error::Timeout { after }
            })?,
            None => operation.await,
        }
    }
}

/// Statements executed inside an open database transaction, waiting for commit.
/// The product locks are released only after the commit.
struct Staged<T> {
    guard: ProductGuard,
    txn: DatabaseTransaction,
    value: T,
}

impl<T> Staged<T> {
    fn new(guard: ProductGuard, txn: DatabaseTransaction, value: T) -> Self {
        Self { guard, txn, value }
    }

    async fn commit(self) -> Result<T> {
        self.txn.commit().await?;
        drop(self.guard);
        Ok(self.value)
    }
}

fn validate(new: &NewTransaction) -> Result<()> {
    validate_product_id(&new.product_id)?;
    validate_quantity(new.quantity)
}

fn validate_quantity(quantity: i64) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Quantity must be a positive integer, got {quantity}"
        )));
    }
    Ok(())
}

fn validate_product_id(product_id: &str) -> Result<()> {
    if product_id.trim().is_empty() {
        return Err(Error::validation("Product ID is required"));
    }
    Ok(())
}

fn out_of_range() -> Error {
    Error::validation(format!("Stock must stay between 0 and {}", i64::MAX))
}

/// Sums the stock changes of an edit per product, in product id order.
fn net_deltas<'a>(changes: [(&'a str, i64); 2]) -> Result<BTreeMap<&'a str, i64>> {
    let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
    for (product_id, delta) in changes {
        let entry = deltas.entry(product_id).or_default();
        *entry = entry.checked_add(delta).ok_or_else(out_of_range)?;
    }
    Ok(deltas)
}

/// Moves a product's stock by `delta` inside `conn` and returns the new stock.
///
/// The update is the first statement, so the write lock is taken before anything
/// is read. It only matches while the result stays within `0..=i64::MAX`, so the
/// guard holds against the committed value even if something slipped past the
/// product lock.
async fn adjust_stock<C>(conn: &C, product_id: &str, delta: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let bound = if delta < 0 {
        product::Column::Stock.gte(delta.checked_neg().ok_or_else(out_of_range)?)
    } else {
        product::Column::Stock.lte(i64::MAX - delta)
    };

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(delta),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(bound)
        .exec(conn)
        .await?;

    let product = Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;

    if result.rows_affected == 0 {
        if delta > 0 {
            return Err(out_of_range());
        }
        return Err(Error::InsufficientStock {
            product_id: product_id.to_string(),
            available: product.stock,
            requested: -delta,
        });
    }
    Ok(product.stock)
}

/// Reversing a purchase whose units were sold since is a referential problem,
/// not a shortage on the caller's side.
fn stranded_stock(err: Error, removed: &transaction::Model) -> Error {
    match err {
        Error::InsufficientStock { available, .. } => Error::constraint(format!(
            "Removing {} of {} units from product {} would leave {} in stock",
            removed.kind,
            removed.quantity,
            removed.product_id,
            available - removed.quantity
        )),
        other => other,
    }
}

fn classify_replace_failure(
    err: Error,
    product_id: &str,
    old: &transaction::Model,
    new: &NewTransaction,
) -> Error {
    let Error::InsufficientStock { available, .. } = err else {
        return err;
    };
    let after_reversal = if product_id == old.product_id {
        available.saturating_sub(old.signed_quantity())
    } else {
        available
    };

    if after_reversal < 0 {
        stranded_stock(
            Error::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested: old.quantity,
            },
            old,
        )
    } else {
        Error::InsufficientStock {
            product_id: product_id.to_string(),
            available: after_reversal,
            requested: new.quantity,
        }
    }
}

/// Retrieves a transaction by its id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: &str,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a transaction with its product's name and price.
pub async fn get_transaction_view(
    db: &DatabaseConnection,
    transaction_id: &str,
) -> Result<Option<TransactionView>> {
    Ok(Transaction::find_by_id(transaction_id)
        .find_also_related(Product)
        .one(db)
        .await?
        .map(TransactionView::from))
}

/// Retrieves all transactions, newest business date first.
pub async fn get_all_transactions(db: &DatabaseConnection) -> Result<Vec<TransactionView>> {
    Ok(Transaction::find()
        .find_also_related(Product)
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(TransactionView::from)
        .collect())
}

/// Retrieves a product's transactions in the order they happened.
pub async fn get_transactions_for_product(
    db: &DatabaseConnection,
    product_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::ProductId.eq(product_id))
        .order_by_asc(transaction::Column::Date)
        .order_by_asc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Recomputes a product's stock from its history.
///
/// # Errors
/// Returns `NotFound` if the product does not exist.
pub async fn audit_product(db: &DatabaseConnection, product_id: &str) -> Result<StockAudit> {
    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Product", product_id))?;
    let history = get_transactions_for_product(db, product_id).await?;
    let total: i128 = history
        .iter()
        .map(|t| i128::from(t.signed_quantity()))
        .sum();

    Ok(StockAudit {
        recorded: product.stock,
        derived: i64::try_from(total).map_err(|_| out_of_range())?,
        transaction_count: history.len(),
    })
}

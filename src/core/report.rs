//! Report generation business logic.
//!
//! This module builds the read-only reports over the current inventory and its
//! transaction history. All functions return structured, serializable data; the
//! HTTP layer only wraps them in JSON. Monetary totals are rounded to cents.

use crate::{
    core::product::{ProductView, get_low_stock_products},
    entities::{
        Product, Supplier, Transaction, TransactionKind, product, supplier, transaction,
    },
    errors::Result,
};
use chrono::{Months, NaiveDate};
use sea_orm::{PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headline counts for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_products: u64,
    pub total_suppliers: u64,
    pub total_transactions: u64,
    /// Sum of price × stock over all products
    pub inventory_value: f64,
}

/// One product's contribution to the inventory value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductValue {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryValueReport {
    /// Products by value, highest first
    pub products: Vec<ProductValue>,
    pub total_inventory_value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierSummary {
    pub id: String,
    pub name: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierProducts {
    pub supplier: SupplierSummary,
    pub product_count: usize,
    pub products: Vec<product::Model>,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockReport {
    pub threshold: i64,
    pub count: usize,
    pub products: Vec<ProductView>,
}

/// A sale with the product's current price applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleLine {
    #[serde(flatten)]
    pub transaction: transaction::Model,
    pub product_name: String,
    pub unit_price: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    /// Newest first
    pub transactions: Vec<SaleLine>,
    pub total_sales: f64,
    pub transaction_count: usize,
}

/// Count, units and value of one kind of movement within a month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlowTotals {
    pub count: u64,
    pub quantity: i64,
    pub value: f64,
}

impl FlowTotals {
    fn record(&mut self, quantity: i64, price: f64) {
        self.count += 1;
        self.quantity = self.quantity.saturating_add(quantity);
        self.value += as_units(quantity) * price;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTrend {
    /// `YYYY-MM`
    pub month: String,
    pub sales: FlowTotals,
    pub purchases: FlowTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrends {
    /// Oldest month first
    pub trends: Vec<MonthTrend>,
    pub period: String,
    pub total_months: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: String,
    pub product_count: usize,
    pub total_stock: i64,
    pub total_value: f64,
    pub avg_price: f64,
    pub min_stock: i64,
    pub max_stock: i64,
    pub low_stock_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalytics {
    pub categories: Vec<CategoryStats>,
    pub total_categories: usize,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierContact {
    pub id: String,
    pub name: String,
    pub contact: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierTotals {
    pub product_count: usize,
    pub total_stock: i64,
    pub total_value: f64,
    pub avg_product_price: f64,
    pub low_stock_products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierMetrics {
    pub supplier: SupplierContact,
    pub metrics: SupplierTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPerformance {
    pub suppliers: Vec<SupplierMetrics>,
    pub total_suppliers: usize,
}

/// Counts every table and values the stock on hand.
pub async fn dashboard(db: &DatabaseConnection) -> Result<DashboardStats> {
    let products = Product::find().all(db).await?;
    Ok(DashboardStats {
        total_products: products.len() as u64,
        total_suppliers: Supplier::find().count(db).await?,
        total_transactions: Transaction::find().count(db).await?,
        inventory_value: round_cents(products.iter().map(stock_value).sum()),
    })
}

/// Values each product at price × stock, highest value first.
pub async fn inventory_value(db: &DatabaseConnection) -> Result<InventoryValueReport> {
    let mut products: Vec<ProductValue> = Product::find()
        .order_by_asc(product::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|p| ProductValue {
            total_value: round_cents(stock_value(&p)),
            id: p.id,
            name: p.name,
            category: p.category,
            price: p.price,
            stock: p.stock,
        })
        .collect();
    products.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));

    Ok(InventoryValueReport {
        total_inventory_value: round_cents(products.iter().map(|p| p.total_value).sum()),
        products,
    })
}

/// Groups products under their supplier. Suppliers without products are listed too.
pub async fn products_by_supplier(db: &DatabaseConnection) -> Result<Vec<SupplierProducts>> {
    let mut report: Vec<SupplierProducts> = Supplier::find()
        .find_with_related(Product)
        .order_by_asc(supplier::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|(s, mut products)| {
            products.sort_by(|a, b| a.name.cmp(&b.name));
            SupplierProducts {
                product_count: products.len(),
                total_value: round_cents(products.iter().map(stock_value).sum()),
                supplier: SupplierSummary {
                    id: s.id,
                    name: s.name,
                    contact: s.contact,
                },
                products,
            }
        })
        .collect();
    report.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));
    Ok(report)
}

/// Products below `threshold`, lowest stock first.
pub async fn low_stock(db: &DatabaseConnection, threshold: i64) -> Result<LowStockReport> {
    let products = get_low_stock_products(db, threshold).await?;
    Ok(LowStockReport {
        threshold,
        count: products.len(),
        products,
    })
}

/// Every sale valued at the product's current price, newest first.
pub async fn sales(db: &DatabaseConnection) -> Result<SalesReport> {
    let transactions: Vec<SaleLine> = Transaction::find()
        .filter(transaction::Column::Kind.eq(TransactionKind::Sale))
        .find_also_related(Product)
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(t, p)| {
            p.map(|p| SaleLine {
                total_value: as_units(t.quantity) * p.price,
                product_name: p.name,
                unit_price: p.price,
                transaction: t,
            })
        })
        .collect();

    Ok(SalesReport {
        total_sales: round_cents(transactions.iter().map(|s| s.total_value).sum()),
        transaction_count: transactions.len(),
        transactions,
    })
}

/// Monthly movement totals for the last `months` months, counted back from today.
pub async fn monthly_trends(db: &DatabaseConnection, months: u32) -> Result<MonthlyTrends> {
    monthly_trends_since(db, months, chrono::Utc::now().date_naive()).await
}

/// Monthly movement totals for transactions dated within `months` months before `today`.
pub async fn monthly_trends_since(
    db: &DatabaseConnection,
    months: u32,
    today: NaiveDate,
) -> Result<MonthlyTrends> {
    let since = today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN);

    let rows = Transaction::find()
        .filter(transaction::Column::Date.gte(since))
        .find_also_related(Product)
        .all(db)
        .await?;

    let mut buckets: BTreeMap<String, MonthTrend> = BTreeMap::new();
    for (t, p) in rows {
        let Some(p) = p else { continue };
        let month = t.date.format("%Y-%m").to_string();
        let bucket = buckets.entry(month.clone()).or_insert_with(|| MonthTrend {
            month,
            sales: FlowTotals::default(),
            purchases: FlowTotals::default(),
        });
        match t.kind {
            TransactionKind::Sale => bucket.sales.record(t.quantity, p.price),
            TransactionKind::Purchase => bucket.purchases.record(t.quantity, p.price),
        }
    }

    let trends: Vec<MonthTrend> = buckets
        .into_values()
        .map(|mut m| {
            m.sales.value = round_cents(m.sales.value);
            m.purchases.value = round_cents(m.purchases.value);
            m
        })
        .collect();

    Ok(MonthlyTrends {
        total_months: trends.len(),
        period: format!("{months} months"),
        trends,
    })
}

/// Per-category stock statistics, highest value first.
pub async fn category_analytics(
    db: &DatabaseConnection,
    low_stock_threshold: i64,
) -> Result<CategoryAnalytics> {
    let mut groups: BTreeMap<String, Vec<product::Model>> = BTreeMap::new();
    for p in Product::find().all(db).await? {
        groups.entry(p.category.clone()).or_default().push(p);
    }

    let mut categories: Vec<CategoryStats> = groups
        .into_iter()
        .map(|(category, products)| CategoryStats {
            category,
            product_count: products.len(),
            total_stock: products.iter().map(|p| p.stock).fold(0, i64::saturating_add),
            total_value: round_cents(products.iter().map(stock_value).sum()),
            avg_price: round_cents(average(products.iter().map(|p| p.price))),
            min_stock: products.iter().map(|p| p.stock).min().unwrap_or(0),
            max_stock: products.iter().map(|p| p.stock).max().unwrap_or(0),
            low_stock_count: products
                .iter()
                .filter(|p| p.stock < low_stock_threshold)
                .count(),
        })
        .collect();
    categories.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));

    Ok(CategoryAnalytics {
        total_categories: categories.len(),
        total_value: round_cents(categories.iter().map(|c| c.total_value).sum()),
        categories,
    })
}

/// Per-supplier stock metrics, highest value first.
pub async fn supplier_performance(
    db: &DatabaseConnection,
    low_stock_threshold: i64,
) -> Result<SupplierPerformance> {
    let mut suppliers: Vec<SupplierMetrics> = Supplier::find()
        .find_with_related(Product)
        .order_by_asc(supplier::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|(s, products)| SupplierMetrics {
            metrics: SupplierTotals {
                product_count: products.len(),
                total_stock: products.iter().map(|p| p.stock).fold(0, i64::saturating_add),
                total_value: round_cents(products.iter().map(stock_value).sum()),
                avg_product_price: round_cents(average(products.iter().map(|p| p.price))),
                low_stock_products: products
                    .iter()
                    .filter(|p| p.stock < low_stock_threshold)
                    .count(),
            },
            supplier: SupplierContact {
                id: s.id,
                name: s.name,
                contact: s.contact,
                email: s.email,
            },
        })
        .collect();
    suppliers.sort_by(|a, b| b.metrics.total_value.total_cmp(&a.metrics.total_value));

    Ok(SupplierPerformance {
        total_suppliers: suppliers.len(),
        suppliers,
    })
}

/// Rounds a monetary amount to whole cents.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn stock_value(p: &product::Model) -> f64 {
    as_units(p.stock) * p.price
}

// Stock counts stay far below 2^53, so the conversion is exact.
#[allow(clippy::cast_precision_loss)]
const fn as_units(quantity: i64) -> f64 {
    quantity as f64
}

#[allow(clippy::cast_precision_loss)]
fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

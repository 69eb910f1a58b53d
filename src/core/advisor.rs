//! Advisory service - reorder suggestions and inventory chat.
//!
//! Advice is produced by an optional [`TextGenerator`]. When none is configured,
//! or the generator fails, times out, or returns nothing usable, the advisor
//! falls back to a deterministic answer computed from the stored data. Generator
//! failures are logged and never reach the caller.

use crate::{
    core::{ledger::get_transactions_for_product, product::get_product_by_id, supplier},
    entities::{Product, TransactionKind, product, transaction},
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

const REORDER_SYSTEM_PROMPT: &str = "You are an inventory management assistant. Analyze the \
    product data and give a concise, actionable reorder recommendation with a specific quantity.";
const CHAT_SYSTEM_PROMPT: &str = "You are a concise inventory management assistant. Answer with \
    short, specific statements that use the numbers provided.";
const FALLBACK_NOTE: &str = "(AI service temporarily unavailable)";
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling limits for one generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Sampling {
    /// Reorder advice: room for reasoning before the recommendation.
    pub const REORDER: Self = Self {
        temperature: 0.6,
        top_p: 0.95,
        max_tokens: 1024,
    };
    /// Chat: short, factual answers.
    pub const CHAT: Self = Self {
        temperature: 0.3,
        top_p: 0.9,
        max_tokens: 200,
    };
}

/// A source of generated text, typically a hosted language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Completes `prompt` under the given system instructions.
    async fn complete(&self, system: &str, prompt: &str, sampling: Sampling) -> Result<String>;
}

/// Where a piece of advice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSuggestion {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: i64,
    pub suggestion: String,
    pub source: AdviceSource,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSuggestions {
    pub count: usize,
    pub suggestions: Vec<ReorderSuggestion>,
    pub timestamp: DateTime<Utc>,
}

/// Inventory figures the chat answer was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    pub total_products: usize,
    /// Whole dollars
    pub total_value: i64,
    pub low_stock_count: usize,
    pub categories_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub source: AdviceSource,
    pub timestamp: DateTime<Utc>,
    pub data_snapshot: DataSnapshot,
}

/// Sales and purchase totals of one product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementSummary {
    pub total_sold: i64,
    pub total_purchased: i64,
    pub sale_count: usize,
    pub purchase_count: usize,
}

impl MovementSummary {
    #[must_use]
    pub fn from_history(history: &[transaction::Model]) -> Self {
        history.iter().fold(Self::default(), |mut acc, t| {
            match t.kind {
                TransactionKind::Sale => {
                    acc.total_sold = acc.total_sold.saturating_add(t.quantity);
                    acc.sale_count += 1;
                }
                TransactionKind::Purchase => {
                    acc.total_purchased = acc.total_purchased.saturating_add(t.quantity);
                    acc.purchase_count += 1;
                }
            }
            acc
        })
    }
}

/// The advisory service. Cheap to clone.
#[derive(Clone)]
pub struct Advisor {
    generator: Option<Arc<dyn TextGenerator>>,
    low_stock_threshold: i64,
    generation_timeout: Duration,
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("generator", &self.generator.is_some())
            .field("low_stock_threshold", &self.low_stock_threshold)
            .field("generation_timeout", &self.generation_timeout)
            .finish()
    }
}

impl Advisor {
    /// An advisor that only gives deterministic advice.
    #[must_use]
    pub const fn new(low_stock_threshold: i64) -> Self {
        Self {
            generator: None,
            low_stock_threshold,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub const fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    /// Suggests whether and how much of a product to reorder.
    ///
    /// # Errors
    /// Returns `Validation` for a blank id and `NotFound` for an unknown product.
    #[instrument(skip(self, db))]
    pub async fn reorder_suggestion(
        &self,
        db: &DatabaseConnection,
        product_id: &str,
    ) -> Result<ReorderSuggestion> {
        if product_id.trim().is_empty() {
            return Err(Error::validation("Product ID is required"));
        }
        let product = get_product_by_id(db, product_id)
            .await?
            .ok_or_else(|| Error::not_found("Product", product_id))?;
        let history = get_transactions_for_product(db, product_id).await?;
        Ok(self.suggest(product, &history).await)
    }

    /// Suggestions for every product below the low-stock threshold.
    pub async fn batch_reorder_suggestions(
        &self,
        db: &DatabaseConnection,
    ) -> Result<BatchSuggestions> {
        let low = Product::find()
            .filter(product::Column::Stock.lt(self.low_stock_threshold))
            .order_by_asc(product::Column::Stock)
            .order_by_asc(product::Column::Name)
            .all(db)
            .await?;

        let mut suggestions = Vec::with_capacity(low.len());
        for product in low {
            let history = get_transactions_for_product(db, &product.id).await?;
            suggestions.push(self.suggest(product, &history).await);
        }

        Ok(BatchSuggestions {
            count: suggestions.len(),
            suggestions,
            timestamp: Utc::now(),
        })
    }

    /// Answers a free-form question about the current inventory.
    ///
    /// # Errors
    /// Returns `Validation` for a blank message.
    #[instrument(skip(self, db, message))]
    pub async fn chat(&self, db: &DatabaseConnection, message: &str) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(Error::validation("Message is required"));
        }
        let products = Product::find()
            .order_by_asc(product::Column::Name)
            .all(db)
            .await?;
        let suppliers: Vec<String> = supplier::get_all_suppliers(db)
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        let facts = InventoryFacts::gather(&products, suppliers, self.low_stock_threshold);

        let prompt = facts.chat_prompt(message);
        let generated = self
            .generate(CHAT_SYSTEM_PROMPT, &prompt, Sampling::CHAT)
            .await;
        let (text, source) = match generated {
            Some(text) => (text, AdviceSource::Generated),
            None => (
                format!("{} {FALLBACK_NOTE}", facts.fallback_answer(message)),
                AdviceSource::Fallback,
            ),
        };

        Ok(ChatReply {
            message: text,
            source,
            timestamp: Utc::now(),
            data_snapshot: facts.snapshot(),
        })
    }

    async fn suggest(
        &self,
        product: product::Model,
        history: &[transaction::Model],
    ) -> ReorderSuggestion {
        let movement = MovementSummary::from_history(history);
        let prompt = reorder_prompt(&product, &movement, history);

        let (suggestion, source) = match self
            .generate(REORDER_SYSTEM_PROMPT, &prompt, Sampling::REORDER)
            .await {
            Some(text) => (text, AdviceSource::Generated),
            None => (
                fallback_reorder(product.stock, movement.total_sold),
                AdviceSource::Fallback,
            ),
        };

        ReorderSuggestion {
            product_id: product.id,
            product_name: product.name,
            current_stock: product.stock,
            suggestion,
            source,
            timestamp: Utc::now(),
        }
    }

    /// Runs the generator, if any. `None` means "use the fallback".
    async fn generate(&self, system: &str, prompt: &str, sampling: Sampling) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let call = generator.complete(system, prompt, sampling);
        match tokio::time::timeout(self.generation_timeout, call).await {
            Ok(Ok(raw)) => {
                let text = strip_think_tags(&raw);
                if text.is_empty() {
                    debug!("Generator returned no usable text");
                    None
                } else {
                    Some(text)
                }
            }
            Ok(Err(e)) => {
                warn!("Text generation failed, using fallback: {e}");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.generation_timeout, "Text generation timed out, using fallback");
                None
            }
        }
    }
}

/// Deterministic reorder advice from current stock and lifetime sales.
///
/// Monthly sales are estimated as a third of everything ever sold (at least one
/// unit); the reorder point is two months of sales.
#[must_use]
pub fn fallback_reorder(current_stock: i64, total_sold: i64) -> String {
    let avg_monthly_sales = (total_sold.saturating_add(2) / 3).max(1);
    let reorder_point = avg_monthly_sales.saturating_mul(2);

    if current_stock <= reorder_point {
        let suggested = avg_monthly_sales.saturating_mul(3).max(20);
        format!(
            "REORDER RECOMMENDED: Current stock ({current_stock}) is at or below the reorder point \
             ({reorder_point}). Suggested order quantity: {suggested} units based on average monthly \
             sales of {avg_monthly_sales} units. {FALLBACK_NOTE}"
        )
    } else {
        let months = current_stock / avg_monthly_sales;
        format!(
            "Stock levels are adequate. Current stock ({current_stock}) covers approximately \
             {months} months of sales. {FALLBACK_NOTE}"
        )
    }
}

/// Removes every `<think>...</think>` segment and trims the rest.
/// An unterminated `<think>` is left as it is.
#[must_use]
pub fn strip_think_tags(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let Some(len) = rest[start..].find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[start + len + CLOSE.len()..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn reorder_prompt(
    product: &product::Model,
    movement: &MovementSummary,
    history: &[transaction::Model],
) -> String {
    let recent: Vec<String> = history
        .iter()
        .rev()
        .take(10)
        .rev()
        .map(|t| format!("- {}: {} units on {}", t.kind, t.quantity, t.date))
        .collect();

    format!(
        "Product: {}\nCategory: {}\nCurrent stock: {} units\nPrice: ${:.2}\n\
         Total sold: {} units in {} sales\nTotal purchased: {} units in {} purchases\n\
         Recent transactions:\n{}\n\nRecommend whether to reorder and how many units.",
        product.name,
        product.category,
        product.stock,
        product.price,
        movement.total_sold,
        movement.sale_count,
        movement.total_purchased,
        movement.purchase_count,
        recent.join("\n"),
    )
}

struct InventoryFacts {
    total_products: usize,
    total_value: f64,
    threshold: i64,
    low_stock: Vec<(String, i64)>,
    categories: Vec<String>,
    suppliers: Vec<String>,
}

impl InventoryFacts {
    fn gather(products: &[product::Model], suppliers: Vec<String>, threshold: i64) -> Self {
        let mut categories: Vec<String> = Vec::new();
        for p in products {
            if !categories.contains(&p.category) {
                categories.push(p.category.clone());
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let total_value = products.iter().map(|p| p.price * p.stock as f64).sum();

        Self {
            total_products: products.len(),
            total_value,
            threshold,
            low_stock: products
                .iter()
                .filter(|p| p.stock < threshold)
                .map(|p| (p.name.clone(), p.stock))
                .collect(),
            categories,
            suppliers,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn rounded_value(&self) -> i64 {
        self.total_value.round() as i64
    }

    fn snapshot(&self) -> DataSnapshot {
        DataSnapshot {
            total_products: self.total_products,
            total_value: self.rounded_value(),
            low_stock_count: self.low_stock.len(),
            categories_count: self.categories.len(),
        }
    }

    fn chat_prompt(&self, message: &str) -> String {
        let low: Vec<String> = self
            .low_stock
            .iter()
            .take(5)
            .map(|(name, stock)| format!("- {name}: {stock} units"))
            .collect();
        format!(
            "Total products: {}\nTotal inventory value: ${}\nLow stock items: {} (below {} units)\n\
             Categories: {}\nSuppliers: {}\nLow stock products:\n{}\n\nQuestion: \"{message}\"",
            self.total_products,
            group_thousands(self.rounded_value()),
            self.low_stock.len(),
            self.threshold,
            self.categories.join(", "),
            self.suppliers.len(),
            low.join("\n"),
        )
    }

    fn fallback_answer(&self, message: &str) -> String {
        let question = message.to_lowercase();
        let value = group_thousands(self.rounded_value());
        let reorder_count = self.low_stock.len();

        if question.contains("inventory") || question.contains("status") {
            format!(
                "You have {} products worth ${value}. {reorder_count} items need reordering (below {} units).",
                self.total_products, self.threshold
            )
        } else if question.contains("reorder") || question.contains("low stock") {
            let names: Vec<&str> = self.low_stock.iter().take(3).map(|(n, _)| n.as_str()).collect();
            format!(
                "{reorder_count} products need reordering: {}{}",
                names.join(", "),
                ellipsis(reorder_count, 3)
            )
        } else if question.contains("supplier") {
            format!(
                "You have {} suppliers. Top suppliers: {}",
                self.suppliers.len(),
                self.suppliers
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        } else if question.contains("categor") {
            format!(
                "{} categories: {}{}",
                self.categories.len(),
                self.categories
                    .iter()
                    .take(4)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                ellipsis(self.categories.len(), 4)
            )
        } else {
            format!(
                "Current inventory: {} products, ${value} total value, {reorder_count} items need reordering.",
                self.total_products
            )
        }
    }
}

const fn ellipsis(len: usize, shown: usize) -> &'static str {
    if len > shown { "..." } else { "" }
}

/// Formats an integer with comma thousands separators.
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

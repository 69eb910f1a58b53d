//! Per-product lock registry.
//!
//! Every stock mutation runs inside a critical section keyed by product id, so
//! operations on the same product are serialized while different products proceed
//! in parallel. Multi-product operations take their locks in sorted id order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Shared registry of product locks. Cloning shares the same registry.
#[derive(Clone, Debug, Default)]
pub struct ProductLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Holds the locks of one or more products until dropped.
#[derive(Debug)]
pub struct ProductGuard {
    product_ids: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ProductGuard {
    /// Product ids covered by this guard, in acquisition order.
    #[must_use]
    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }
}

impl ProductLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the locks of all given products. Duplicates are ignored.
    pub async fn acquire<I, S>(&self, product_ids: I) -> ProductGuard
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered: BTreeSet<String> = product_ids.into_iter().map(Into::into).collect();

        let slots: Vec<Arc<Mutex<()>>> = {
            let mut registry = self.slots.lock().await;
            // Slots nobody holds or waits on can go
            registry.retain(|_, slot| Arc::strong_count(slot) > 1);
            ordered
                .iter()
                .map(|id| Arc::clone(registry.entry(id.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(slots.len());
        for slot in slots {
            guards.push(slot.lock_owned().await);
        }
        trace!(products = ?ordered, "Product locks acquired");

        ProductGuard {
            product_ids: ordered.into_iter().collect(),
            _guards: guards,
        }
    }

    /// Number of products with a live lock slot.
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}

//! Capability traits for inventory collaborators.
//!
//! Both traits are object-safe and used as `Arc<dyn ...>` so the checkout path can run
//! against the in-memory store in tests and against Postgres in production.

use async_trait::async_trait;
use rust_decimal::Decimal;

use shopcart_core::{ProductId, StoreError};

use crate::product::{Product, StockSnapshot};

/// Result of a conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Stock was decremented; `unit_price` is the price at the moment of the decrement.
    Reserved { unit_price: Decimal, remaining: i64 },
    /// Not enough stock at the moment of the decrement; nothing changed.
    InsufficientStock { available: i64 },
    /// No product with that id; nothing changed.
    NotFound,
}

/// Stock reads and the single concurrency-control primitive: the conditional decrement.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Current stock for a product, `None` if it does not exist.
    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError>;

    /// Atomically subtract `quantity` only if at least `quantity` units remain.
    ///
    /// `quantity` must be strictly positive.
    async fn decrement(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<DecrementOutcome, StoreError>;

    /// Add `quantity` back (compensation for a reservation that must be undone).
    async fn increment(&self, product_id: ProductId, quantity: i64) -> Result<(), StoreError>;
}

/// Plain catalog CRUD used by the product endpoints.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Insert a product. Returns `false` if the id is already taken.
    async fn create(&self, product: Product) -> Result<bool, StoreError>;

    async fn get(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products ordered by id.
    async fn list(&self) -> Result<Vec<Product>, StoreError>;

    /// Replace a product. Returns `None` if it does not exist.
    async fn update(&self, product: Product) -> Result<Option<Product>, StoreError>;

    /// Returns `false` if nothing was deleted.
    async fn delete(&self, product_id: ProductId) -> Result<bool, StoreError>;
}

pub(crate) fn ensure_positive(quantity: i64) -> Result<(), StoreError> {
    if quantity <= 0 {
        return Err(StoreError::InvalidArgument(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

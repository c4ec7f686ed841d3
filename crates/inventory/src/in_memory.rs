use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use shopcart_core::{ProductId, StoreError};

use crate::gateway::{ensure_positive, DecrementOutcome, InventoryGateway, ProductCatalog};
use crate::product::{Product, StockSnapshot};

/// In-memory catalog and stock counters.
///
/// Intended for tests/dev. Every operation takes the same lock, so the conditional
/// decrement is a single check-and-subtract that cannot interleave with another.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    products: Mutex<BTreeMap<ProductId, Product>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store (later duplicates replace earlier ones).
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            products: Mutex::new(map),
        }
    }

    /// Stock currently on hand, `None` if the product does not exist.
    pub fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        let map = self.products.lock().ok()?;
        map.get(&product_id).map(|p| p.quantity_in_stock)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ProductId, Product>>, StoreError> {
        self.products
            .lock()
            .map_err(|_| StoreError::LockPoisoned("inventory"))
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        let map = self.lock()?;
        Ok(map.get(&product_id).map(Product::snapshot))
    }

    async fn decrement(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<DecrementOutcome, StoreError> {
        ensure_positive(quantity)?;

        let mut map = self.lock()?;
        let Some(product) = map.get_mut(&product_id) else {
            return Ok(DecrementOutcome::NotFound);
        };

        if product.quantity_in_stock < quantity {
            return Ok(DecrementOutcome::InsufficientStock {
                available: product.quantity_in_stock,
            });
        }

        product.quantity_in_stock -= quantity;
        Ok(DecrementOutcome::Reserved {
            unit_price: product.price,
            remaining: product.quantity_in_stock,
        })
    }

    async fn increment(&self, product_id: ProductId, quantity: i64) -> Result<(), StoreError> {
        ensure_positive(quantity)?;

        let mut map = self.lock()?;
        let product = map.get_mut(&product_id).ok_or_else(|| {
            StoreError::Corrupt(format!("product {product_id} no longer exists"))
        })?;
        product.quantity_in_stock = product
            .quantity_in_stock
            .checked_add(quantity)
            .ok_or_else(|| {
                StoreError::InvalidArgument(format!(
                    "restoring {quantity} units would overflow stock of product {product_id}"
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryInventory {
    async fn create(&self, product: Product) -> Result<bool, StoreError> {
        let mut map = self.lock()?;
        if map.contains_key(&product.id) {
            return Ok(false);
        }
        map.insert(product.id, product);
        Ok(true)
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.lock()?.get(&product_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn update(&self, product: Product) -> Result<Option<Product>, StoreError> {
        let mut map = self.lock()?;
        match map.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(&product_id).is_some())
    }
}

//! Cart storage capability and its in-memory backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use shopcart_core::{CartId, StoreError};

use crate::cart::Cart;

/// Cart persistence as consumed by the cart service and the checkout coordinator.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get(&self, cart_id: CartId) -> Result<Option<Cart>, StoreError>;

    /// Create or replace the cart with its current line items.
    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;

    /// Remove a cart. Deleting a cart that does not exist is a no-op, not an error.
    async fn delete(&self, cart_id: CartId) -> Result<(), StoreError>;
}

/// In-memory cart store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<CartId, Cart>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, cart_id: CartId) -> bool {
        self.carts
            .read()
            .map(|m| m.contains_key(&cart_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, cart_id: CartId) -> Result<Option<Cart>, StoreError> {
        let map = self
            .carts
            .read()
            .map_err(|_| StoreError::LockPoisoned("carts"))?;
        Ok(map.get(&cart_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut map = self
            .carts
            .write()
            .map_err(|_| StoreError::LockPoisoned("carts"))?;
        map.insert(cart.id(), cart.clone());
        Ok(())
    }

    async fn delete(&self, cart_id: CartId) -> Result<(), StoreError> {
        let mut map = self
            .carts
            .write()
            .map_err(|_| StoreError::LockPoisoned("carts"))?;
        map.remove(&cart_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shopcart_core::ProductId;

    use super::*;
    use crate::cart::LineItem;

    #[tokio::test]
    async fn save_then_get_returns_the_cart() {
        let store = InMemoryCartStore::new();
        let cart = Cart::from_items(CartId::new(3), [LineItem::new(ProductId::new(1), 2)]);

        store.save(&cart).await.unwrap();
        assert_eq!(store.get(CartId::new(3)).await.unwrap(), Some(cart));
        assert!(store.get(CartId::new(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryCartStore::new();
        store.save(&Cart::from_items(CartId::new(3), [LineItem::new(ProductId::new(1), 2)]))
            .await
            .unwrap();

        store.delete(CartId::new(3)).await.unwrap();
        store.delete(CartId::new(3)).await.unwrap();
        assert!(!store.contains(CartId::new(3)));
    }
}

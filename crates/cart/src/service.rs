//! Application-facing cart operations: add-to-cart, read, checkout.

use std::sync::Arc;

use tracing::{info, instrument};

use shopcart_core::{CartError, CartId, CartResult};
use shopcart_inventory::InventoryGateway;

use crate::aggregator::merge;
use crate::cart::{Cart, LineItem};
use crate::checkout::{CheckoutCoordinator, CheckoutResult, Reconciliation};
use crate::guard::CartGuards;
use crate::store::CartStore;
use crate::validator::{StockValidator, ValidationMode};

/// Wires the aggregator, validator and coordinator around one set of collaborators.
pub struct CartService {
    carts: Arc<dyn CartStore>,
    validator: StockValidator,
    guards: Arc<CartGuards>,
    coordinator: CheckoutCoordinator,
}

impl core::fmt::Debug for CartService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartService")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl CartService {
    pub fn new(
        inventory: Arc<dyn InventoryGateway>,
        carts: Arc<dyn CartStore>,
        mode: ValidationMode,
    ) -> Self {
        let validator = StockValidator::new(inventory.clone(), mode);
        let guards = Arc::new(CartGuards::new());
        let coordinator = CheckoutCoordinator::new(
            inventory,
            carts.clone(),
            validator.clone(),
            guards.clone(),
        );

        Self {
            carts,
            validator,
            guards,
            coordinator,
        }
    }

    pub fn with_delete_attempts(mut self, attempts: u32) -> Self {
        self.coordinator = self.coordinator.with_delete_attempts(attempts);
        self
    }

    /// Merge `items` into the cart (creating it if needed), validate the merged cart
    /// against current stock, and persist it.
    ///
    /// Nothing is stored when validation fails. A cart whose checkout already committed
    /// starts over empty.
    #[instrument(skip_all, fields(cart_id = %cart_id, incoming = items.len()))]
    pub async fn add_items(&self, cart_id: CartId, items: &[LineItem]) -> CartResult<Cart> {
        let _guard = self.guards.try_acquire(cart_id)?;

        let settled = self.coordinator.is_settled(cart_id);
        let existing = if settled {
            Cart::empty(cart_id)
        } else {
            self.carts
                .get(cart_id)
                .await?
                .unwrap_or_else(|| Cart::empty(cart_id))
        };

        let merged = merge(&existing, items);
        if merged.is_empty() {
            return Err(CartError::malformed(
                "cart must contain at least one product with a positive quantity",
            ));
        }

        self.validator.check(merged.items()).await?;
        self.carts.save(&merged).await?;
        if settled {
            self.coordinator.resolve(cart_id);
        }

        info!(lines = merged.items().len(), total_items = merged.total_items(), "cart saved");
        Ok(merged)
    }

    pub async fn get(&self, cart_id: CartId) -> CartResult<Cart> {
        if self.coordinator.is_settled(cart_id) {
            return Err(CartError::CartNotFound(cart_id));
        }
        self.carts
            .get(cart_id)
            .await?
            .ok_or(CartError::CartNotFound(cart_id))
    }

    pub async fn checkout(&self, cart_id: CartId) -> CartResult<CheckoutResult> {
        self.coordinator.checkout(cart_id).await
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validator.mode()
    }

    pub fn pending_reconciliations(&self) -> Vec<Reconciliation> {
        self.coordinator.pending_reconciliations()
    }
}

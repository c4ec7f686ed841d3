//! Per-cart mutual exclusion.
//!
//! At most one checkout (or cart update) runs per cart id. A second attempt while one is in
//! flight is rejected immediately with `CheckoutConflict` instead of queueing.

use std::collections::HashSet;
use std::sync::Mutex;

use shopcart_core::{CartError, CartId, CartResult, StoreError};

/// Registry of cart ids with an operation in flight.
#[derive(Debug, Default)]
pub struct CartGuards {
    in_flight: Mutex<HashSet<CartId>>,
}

impl CartGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `cart_id`; the claim is released when the returned guard drops.
    pub fn try_acquire(&self, cart_id: CartId) -> CartResult<CartGuard<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| StoreError::LockPoisoned("cart guards"))?;

        if !set.insert(cart_id) {
            return Err(CartError::CheckoutConflict(cart_id));
        }

        Ok(CartGuard {
            guards: self,
            cart_id,
        })
    }

    pub fn is_held(&self, cart_id: CartId) -> bool {
        self.in_flight
            .lock()
            .map(|s| s.contains(&cart_id))
            .unwrap_or(false)
    }
}

/// RAII claim on a cart id.
#[derive(Debug)]
pub struct CartGuard<'a> {
    guards: &'a CartGuards,
    cart_id: CartId,
}

impl CartGuard<'_> {
    pub fn cart_id(&self) -> CartId {
        self.cart_id
    }
}

impl Drop for CartGuard<'_> {
    fn drop(&mut self) {
        // Release even if another holder panicked; a stuck id would block the cart forever.
        let mut set = match self.guards.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.cart_id);
    }
}

//! Checkout coordination: validate, reserve, finalize.
//!
//! ```text
//! Open -> Validating -> Reserving -> Completed
//!             |             |
//!             +-> Failed <--+      (cart left intact, reservations compensated)
//! ```
//!
//! Reservations are conditional decrements applied one product at a time in ascending
//! product id order, so two checkouts sharing products always take them in the same
//! order. Cross-cart races are settled by the decrement alone; the per-cart guard only
//! serializes attempts on the same cart.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shopcart_core::{CartError, CartId, CartResult, ProductId, StoreError};
use shopcart_inventory::{DecrementOutcome, InventoryGateway};

use crate::cart::{Cart, LineItem};
use crate::guard::CartGuards;
use crate::store::CartStore;
use crate::validator::StockValidator;

/// Lifecycle of a single checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Open,
    Validating,
    Reserving,
    Completed,
    Failed,
}

impl CheckoutState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Validating)
                | (Self::Validating, Self::Reserving)
                | (Self::Validating, Self::Failed)
                | (Self::Reserving, Self::Completed)
                | (Self::Reserving, Self::Failed)
        )
    }
}

/// One line of a checkout receipt, priced at reservation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl ReceiptLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Receipt of a successful checkout. Produced once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    pub receipt_id: Uuid,
    pub cart_id: CartId,
    pub total_items: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub lines: Vec<ReceiptLine>,
    pub checked_out_at: DateTime<Utc>,
}

impl CheckoutResult {
    fn from_lines(cart_id: CartId, lines: Vec<ReceiptLine>) -> Self {
        Self {
            receipt_id: Uuid::now_v7(),
            cart_id,
            total_items: lines.iter().map(|l| l.quantity).sum(),
            total_price: lines.iter().map(ReceiptLine::line_total).sum(),
            lines,
            checked_out_at: Utc::now(),
        }
    }
}

/// Work the coordinator could not finish and an operator has to reconcile by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reconciliation {
    /// A compensating increment failed: `quantity` units are missing from stock.
    RestoreStock {
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
        error: String,
    },
    /// Checkout committed but the cart could not be deleted.
    DeleteCart { cart_id: CartId, error: String },
}

/// Tracks the state machine of one attempt and logs every transition.
#[derive(Debug)]
struct Attempt {
    cart_id: CartId,
    state: CheckoutState,
}

impl Attempt {
    fn new(cart_id: CartId) -> Self {
        Self {
            cart_id,
            state: CheckoutState::Open,
        }
    }

    fn advance(&mut self, next: CheckoutState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal checkout transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(cart_id = %self.cart_id, from = ?self.state, to = ?next, "checkout transition");
        self.state = next;
    }

    fn fail(&mut self, err: CartError) -> CartError {
        self.advance(CheckoutState::Failed);
        warn!(cart_id = %self.cart_id, error = %err, "checkout failed");
        err
    }
}

/// Orchestrates checkout. The only component that mutates inventory.
///
/// The reconciliation list lives in process memory and is lost on restart; the `error!`
/// lines carrying `reconciliation_required = true` are the durable record.
pub struct CheckoutCoordinator {
    inventory: Arc<dyn InventoryGateway>,
    carts: Arc<dyn CartStore>,
    validator: StockValidator,
    guards: Arc<CartGuards>,
    delete_attempts: u32,
    reconciliations: Mutex<Vec<Reconciliation>>,
    /// Carts whose checkout committed but whose delete never landed.
    settled: Mutex<HashSet<CartId>>,
}

impl core::fmt::Debug for CheckoutCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CheckoutCoordinator")
            .field("validator", &self.validator)
            .field("delete_attempts", &self.delete_attempts)
            .finish_non_exhaustive()
    }
}

impl CheckoutCoordinator {
    pub fn new(
        inventory: Arc<dyn InventoryGateway>,
        carts: Arc<dyn CartStore>,
        validator: StockValidator,
        guards: Arc<CartGuards>,
    ) -> Self {
        Self {
            inventory,
            carts,
            validator,
            guards,
            delete_attempts: 3,
            reconciliations: Mutex::new(Vec::new()),
            settled: Mutex::new(HashSet::new()),
        }
    }

    /// How many times to try deleting a cart after its reservations committed (min 1).
    pub fn with_delete_attempts(mut self, attempts: u32) -> Self {
        self.delete_attempts = attempts.max(1);
        self
    }

    /// Snapshot of everything flagged for manual reconciliation so far.
    pub fn pending_reconciliations(&self) -> Vec<Reconciliation> {
        match self.reconciliations.lock() {
            Ok(list) => list.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Check out a cart.
    ///
    /// On success stock is decremented for every line and the cart is gone. On failure
    /// the cart is untouched and any partial reservation has been given back, so the
    /// same call can be retried from a clean state.
    #[instrument(skip_all, fields(cart_id = %cart_id))]
    pub async fn checkout(&self, cart_id: CartId) -> CartResult<CheckoutResult> {
        let _guard = self.guards.try_acquire(cart_id)?;

        if self.is_settled(cart_id) {
            self.retire(cart_id).await;
            return Err(CartError::CartNotFound(cart_id));
        }

        let cart = self
            .carts
            .get(cart_id)
            .await?
            .ok_or(CartError::CartNotFound(cart_id))?;

        let mut attempt = Attempt::new(cart_id);

        attempt.advance(CheckoutState::Validating);
        if cart.is_empty() {
            return Err(attempt.fail(CartError::malformed("cart has no items")));
        }
        if let Err(err) = self.validator.check(cart.items()).await {
            return Err(attempt.fail(err));
        }

        attempt.advance(CheckoutState::Reserving);
        let lines = match self.reserve(&cart).await {
            Ok(lines) => lines,
            Err(err) => return Err(attempt.fail(err)),
        };

        attempt.advance(CheckoutState::Completed);
        let result = CheckoutResult::from_lines(cart_id, lines);
        self.finalize(cart_id).await;

        info!(
            receipt_id = %result.receipt_id,
            total_items = result.total_items,
            total_price = %result.total_price,
            "checkout completed"
        );
        Ok(result)
    }

    /// Decrement every line in ascending product order, compensating on the first failure.
    async fn reserve(&self, cart: &Cart) -> CartResult<Vec<ReceiptLine>> {
        let mut items: Vec<LineItem> = cart.items().to_vec();
        items.sort_by_key(|i| i.product_id);

        let mut reserved: Vec<ReceiptLine> = Vec::with_capacity(items.len());

        for item in &items {
            let failure = match self.inventory.decrement(item.product_id, item.quantity).await {
                Ok(DecrementOutcome::Reserved { unit_price, remaining }) => {
                    debug!(product_id = %item.product_id, quantity = item.quantity, remaining, "reserved");
                    reserved.push(ReceiptLine {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price,
                    });
                    continue;
                }
                Ok(DecrementOutcome::InsufficientStock { available }) => CartError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                },
                Ok(DecrementOutcome::NotFound) => CartError::ProductNotFound(item.product_id),
                Err(e) => CartError::Internal(e),
            };

            return Err(self.compensate(cart.id(), &reserved, failure).await);
        }

        Ok(reserved)
    }

    /// Give back every reservation made so far (newest first).
    ///
    /// Returns the error the checkout should report: the original failure, or an
    /// internal failure if stock could not be fully restored.
    async fn compensate(&self, cart_id: CartId, reserved: &[ReceiptLine], failure: CartError) -> CartError {
        let mut escalated: Option<StoreError> = None;

        for line in reserved.iter().rev() {
            if let Err(e) = self.inventory.increment(line.product_id, line.quantity).await {
                error!(
                    cart_id = %cart_id,
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %e,
                    reconciliation_required = true,
                    "compensation failed"
                );
                self.flag(Reconciliation::RestoreStock {
                    cart_id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    error: e.to_string(),
                });
                escalated.get_or_insert(e);
            }
        }

        match escalated {
            Some(e) => CartError::Internal(e),
            None => {
                if !reserved.is_empty() {
                    debug!(cart_id = %cart_id, lines = reserved.len(), "reservations compensated");
                }
                failure
            }
        }
    }

    /// Delete the cart after a committed checkout. Never fails the checkout.
    async fn finalize(&self, cart_id: CartId) {
        let mut last_error = None;

        for attempt in 1..=self.delete_attempts {
            match self.carts.delete(cart_id).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(cart_id = %cart_id, attempt, error = %e, "cart delete failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            error!(cart_id = %cart_id, error = %e, reconciliation_required = true, "cart not deleted after checkout");
            self.lock_settled().insert(cart_id);
            self.flag(Reconciliation::DeleteCart {
                cart_id,
                error: e.to_string(),
            });
        }
    }

    /// Another go at deleting a settled cart. Its stock is already committed.
    async fn retire(&self, cart_id: CartId) {
        match self.carts.delete(cart_id).await {
            Ok(()) => {
                info!(cart_id = %cart_id, "settled cart deleted");
                self.resolve(cart_id);
            }
            Err(e) => warn!(cart_id = %cart_id, error = %e, "settled cart still not deleted"),
        }
    }

    /// Whether the cart's checkout already committed; such a cart must never reserve again.
    pub(crate) fn is_settled(&self, cart_id: CartId) -> bool {
        self.lock_settled().contains(&cart_id)
    }

    /// The stored copy of a settled cart is gone (deleted or overwritten): forget it and
    /// drop its pending `DeleteCart` entry.
    pub(crate) fn resolve(&self, cart_id: CartId) {
        if !self.lock_settled().remove(&cart_id) {
            return;
        }
        let mut list = match self.reconciliations.lock() {
            Ok(list) => list,
            Err(poisoned) => poisoned.into_inner(),
        };
        list.retain(|r| !matches!(r, Reconciliation::DeleteCart { cart_id: id, .. } if *id == cart_id));
    }

    fn lock_settled(&self) -> std::sync::MutexGuard<'_, HashSet<CartId>> {
        match self.settled.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn flag(&self, entry: Reconciliation) {
        match self.reconciliations.lock() {
            Ok(mut list) => list.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use shopcart_inventory::{InMemoryInventory, Product, StockSnapshot};

    use super::*;
    use crate::store::InMemoryCartStore;
    use crate::validator::ValidationMode;

    /// Inventory wrapper that injects faults and records the decrement order.
    #[derive(Default)]
    struct FlakyInventory {
        inner: InMemoryInventory,
        /// Snapshot overstates stock for this product (validation passes, decrement loses).
        stale_snapshot_for: Option<ProductId>,
        fail_decrement_for: Option<ProductId>,
        fail_increments: bool,
        decrements: Mutex<Vec<ProductId>>,
    }

    #[async_trait]
    impl InventoryGateway for FlakyInventory {
        async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
            let snap = self.inner.snapshot(product_id).await?;
            Ok(snap.map(|mut s| {
                if Some(product_id) == self.stale_snapshot_for {
                    s.quantity_available += 1_000;
                }
                s
            }))
        }

        async fn decrement(&self, product_id: ProductId, quantity: i64) -> Result<DecrementOutcome, StoreError> {
            self.decrements.lock().unwrap().push(product_id);
            if Some(product_id) == self.fail_decrement_for {
                return Err(StoreError::unavailable("decrement timed out"));
            }
            self.inner.decrement(product_id, quantity).await
        }

        async fn increment(&self, product_id: ProductId, quantity: i64) -> Result<(), StoreError> {
            if self.fail_increments {
                return Err(StoreError::unavailable("increment refused"));
            }
            self.inner.increment(product_id, quantity).await
        }
    }

    /// Cart store whose deletes fail a fixed number of times.
    #[derive(Default)]
    struct FlakyCartStore {
        inner: InMemoryCartStore,
        delete_failures: AtomicU32,
    }

    #[async_trait]
    impl CartStore for FlakyCartStore {
        async fn get(&self, cart_id: CartId) -> Result<Option<Cart>, StoreError> {
            self.inner.get(cart_id).await
        }

        async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
            self.inner.save(cart).await
        }

        async fn delete(&self, cart_id: CartId) -> Result<(), StoreError> {
            let left = self.delete_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.delete_failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::unavailable("delete failed"));
            }
            self.inner.delete(cart_id).await
        }
    }

    fn product(id: u64, stock: i64, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: format!("p{id}"),
            price: Decimal::new(cents, 2),
            quantity_in_stock: stock,
        }
    }

    fn pid(id: u64) -> ProductId {
        ProductId::new(id)
    }

    fn cart(id: u64, items: &[(u64, i64)]) -> Cart {
        Cart::from_items(
            CartId::new(id),
            items.iter().map(|&(p, q)| LineItem::new(ProductId::new(p), q)),
        )
    }

    struct Harness {
        inventory: Arc<FlakyInventory>,
        carts: Arc<FlakyCartStore>,
        guards: Arc<CartGuards>,
        coordinator: CheckoutCoordinator,
    }

    fn harness(inventory: FlakyInventory, carts: FlakyCartStore) -> Harness {
        let inventory = Arc::new(inventory);
        let carts = Arc::new(carts);
        let guards = Arc::new(CartGuards::new());
        let validator = StockValidator::new(inventory.clone(), ValidationMode::FailFast);
        let coordinator =
            CheckoutCoordinator::new(inventory.clone(), carts.clone(), validator, guards.clone());
        Harness {
            inventory,
            carts,
            guards,
            coordinator,
        }
    }

    fn stocked(products: Vec<Product>) -> FlakyInventory {
        FlakyInventory {
            inner: InMemoryInventory::with_products(products),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn successful_checkout_decrements_stock_and_deletes_cart() {
        let h = harness(
            stocked(vec![product(1, 10, 250), product(2, 5, 1000)]),
            FlakyCartStore::default(),
        );
        h.carts.save(&cart(7, &[(1, 2), (2, 3)])).await.unwrap();

        let result = h.coordinator.checkout(CartId::new(7)).await.unwrap();

        assert_eq!(result.cart_id, CartId::new(7));
        assert_eq!(result.total_items, 5);
        assert_eq!(result.total_price, Decimal::new(3500, 2));
        assert_eq!(result.lines.len(), 2);
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(8));
        assert_eq!(h.inventory.inner.stock_of(pid(2)), Some(2));
        assert!(h.carts.get(CartId::new(7)).await.unwrap().is_none());
        assert!(!h.guards.is_held(CartId::new(7)));
    }

    #[tokio::test]
    async fn missing_cart_is_cart_not_found() {
        let h = harness(stocked(vec![]), FlakyCartStore::default());
        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();
        assert_eq!(err, CartError::CartNotFound(CartId::new(1)));
    }

    #[tokio::test]
    async fn validation_failure_leaves_cart_and_stock_untouched() {
        let h = harness(stocked(vec![product(1, 10, 100), product(2, 1, 100)]), FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 2), (2, 3)])).await.unwrap();

        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert_eq!(
            err,
            CartError::InsufficientStock { product_id: pid(2), requested: 3, available: 1 }
        );
        assert!(h.inventory.decrements.lock().unwrap().is_empty());
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(10));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn vanished_product_is_product_not_found_and_cart_stays_open() {
        let h = harness(stocked(vec![product(1, 10, 100)]), FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 1), (4, 1)])).await.unwrap();

        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert_eq!(err, CartError::ProductNotFound(pid(4)));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_reservation_compensates_earlier_lines() {
        // Product 3 passes validation on a stale snapshot, then loses at decrement time.
        let mut inv = stocked(vec![product(1, 10, 100), product(2, 10, 100), product(3, 1, 100)]);
        inv.stale_snapshot_for = Some(pid(3));
        let h = harness(inv, FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 4), (2, 5), (3, 2)])).await.unwrap();

        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert_eq!(
            err,
            CartError::InsufficientStock { product_id: pid(3), requested: 2, available: 1 }
        );
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(10));
        assert_eq!(h.inventory.inner.stock_of(pid(2)), Some(10));
        assert_eq!(h.inventory.inner.stock_of(pid(3)), Some(1));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
        assert!(h.coordinator.pending_reconciliations().is_empty());
    }

    #[tokio::test]
    async fn backend_error_during_reservation_compensates_and_is_internal() {
        let mut inv = stocked(vec![product(1, 10, 100), product(2, 10, 100)]);
        inv.fail_decrement_for = Some(pid(2));
        let h = harness(inv, FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 4), (2, 5)])).await.unwrap();

        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert!(matches!(err, CartError::Internal(StoreError::Unavailable(_))));
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(10));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_compensation_escalates_and_is_flagged() {
        let mut inv = stocked(vec![product(1, 10, 100), product(2, 0, 100)]);
        inv.stale_snapshot_for = Some(pid(2));
        inv.fail_increments = true;
        let h = harness(inv, FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 4), (2, 1)])).await.unwrap();

        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert!(matches!(err, CartError::Internal(_)));
        assert_eq!(
            h.coordinator.pending_reconciliations(),
            vec![Reconciliation::RestoreStock {
                cart_id: CartId::new(1),
                product_id: pid(1),
                quantity: 4,
                error: "backend unavailable: increment refused".to_string(),
            }]
        );
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reservations_run_in_ascending_product_order() {
        let h = harness(
            stocked(vec![product(3, 5, 100), product(1, 5, 100), product(2, 5, 100)]),
            FlakyCartStore::default(),
        );
        h.carts.save(&cart(1, &[(3, 1), (1, 1), (2, 1)])).await.unwrap();

        h.coordinator.checkout(CartId::new(1)).await.unwrap();

        assert_eq!(*h.inventory.decrements.lock().unwrap(), vec![pid(1), pid(2), pid(3)]);
    }

    #[tokio::test]
    async fn transient_delete_failures_are_retried() {
        let carts = FlakyCartStore {
            delete_failures: AtomicU32::new(2),
            ..Default::default()
        };
        let h = harness(stocked(vec![product(1, 5, 100)]), carts);
        h.carts.save(&cart(1, &[(1, 1)])).await.unwrap();

        h.coordinator.checkout(CartId::new(1)).await.unwrap();

        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_none());
        assert!(h.coordinator.pending_reconciliations().is_empty());
    }

    #[tokio::test]
    async fn exhausted_delete_still_completes_and_is_flagged() {
        let carts = FlakyCartStore {
            delete_failures: AtomicU32::new(10),
            ..Default::default()
        };
        let mut h = harness(stocked(vec![product(1, 5, 100)]), carts);
        h.coordinator = h.coordinator.with_delete_attempts(2);
        h.carts.save(&cart(1, &[(1, 1)])).await.unwrap();

        let result = h.coordinator.checkout(CartId::new(1)).await.unwrap();

        assert_eq!(result.total_items, 1);
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(4));
        assert_eq!(
            h.coordinator.pending_reconciliations(),
            vec![Reconciliation::DeleteCart {
                cart_id: CartId::new(1),
                error: "backend unavailable: delete failed".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn undeleted_cart_is_never_reserved_twice() {
        let carts = FlakyCartStore {
            delete_failures: AtomicU32::new(3),
            ..Default::default()
        };
        let h = harness(stocked(vec![product(1, 10, 100)]), carts);
        h.carts.save(&cart(1, &[(1, 4)])).await.unwrap();

        h.coordinator.checkout(CartId::new(1)).await.unwrap();
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(6));
        assert_eq!(h.coordinator.pending_reconciliations().len(), 1);

        // the retry deletes the stale cart instead of reserving again
        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();
        assert_eq!(err, CartError::CartNotFound(CartId::new(1)));
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(6));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_none());
        assert!(h.coordinator.pending_reconciliations().is_empty());
        assert!(!h.coordinator.is_settled(CartId::new(1)));
    }

    #[tokio::test]
    async fn settled_cart_stays_blocked_while_delete_keeps_failing() {
        let carts = FlakyCartStore {
            delete_failures: AtomicU32::new(100),
            ..Default::default()
        };
        let h = harness(stocked(vec![product(1, 10, 100)]), carts);
        h.carts.save(&cart(1, &[(1, 4)])).await.unwrap();

        h.coordinator.checkout(CartId::new(1)).await.unwrap();
        for _ in 0..3 {
            let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();
            assert_eq!(err, CartError::CartNotFound(CartId::new(1)));
        }

        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(6));
        assert!(h.carts.get(CartId::new(1)).await.unwrap().is_some());
        assert_eq!(h.coordinator.pending_reconciliations().len(), 1);
    }

    #[tokio::test]
    async fn checkout_while_cart_is_claimed_conflicts() {
        let h = harness(stocked(vec![product(1, 5, 100)]), FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 1)])).await.unwrap();

        let _held = h.guards.try_acquire(CartId::new(1)).unwrap();
        let err = h.coordinator.checkout(CartId::new(1)).await.unwrap_err();

        assert_eq!(err, CartError::CheckoutConflict(CartId::new(1)));
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(5));
    }

    #[tokio::test]
    async fn compensated_failure_can_be_retried_after_restock() {
        let h = harness(stocked(vec![product(1, 2, 100)]), FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 3)])).await.unwrap();

        assert!(h.coordinator.checkout(CartId::new(1)).await.is_err());
        h.inventory.inner.increment(pid(1), 1).await.unwrap();

        let result = h.coordinator.checkout(CartId::new(1)).await.unwrap();
        assert_eq!(result.total_items, 3);
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn competing_carts_never_oversell() {
        let h = harness(stocked(vec![product(1, 10, 100)]), FlakyCartStore::default());
        h.carts.save(&cart(1, &[(1, 6)])).await.unwrap();
        h.carts.save(&cart(2, &[(1, 6)])).await.unwrap();

        let coordinator = Arc::new(h.coordinator);
        let a = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move { c.checkout(CartId::new(1)).await })
        };
        let b = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move { c.checkout(CartId::new(2)).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);

        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(
            loser,
            CartError::InsufficientStock { available: 4, .. }
        ));

        let losing_cart = if winners[0].cart_id == CartId::new(1) { 2 } else { 1 };
        assert_eq!(h.inventory.inner.stock_of(pid(1)), Some(4));
        assert!(h.carts.get(CartId::new(losing_cart)).await.unwrap().is_some());
        assert!(h.carts.get(winners[0].cart_id).await.unwrap().is_none());
    }

    #[test]
    fn state_machine_allows_only_forward_transitions() {
        use CheckoutState::*;

        assert!(Open.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Reserving));
        assert!(Validating.can_transition_to(Failed));
        assert!(Reserving.can_transition_to(Completed));
        assert!(Reserving.can_transition_to(Failed));

        assert!(!Open.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Reserving));
        assert!(Completed.is_terminal() && Failed.is_terminal());
        assert!(!Reserving.is_terminal());
    }

    #[test]
    fn receipt_serializes_prices_as_numbers() {
        let result = CheckoutResult::from_lines(
            CartId::new(3),
            vec![ReceiptLine { product_id: pid(1), quantity: 2, unit_price: Decimal::new(125, 2) }],
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cart_id"], 3);
        assert_eq!(json["total_items"], 2);
        assert_eq!(json["total_price"], serde_json::json!(2.5));
    }
}

//! Stock validation against live inventory snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shopcart_core::{CartError, CartResult, StoreError};
use shopcart_inventory::InventoryGateway;

use crate::cart::LineItem;

/// How many violations a validation run collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first violation, in input order.
    #[default]
    FailFast,
    /// Check every item and report all violations (first one still decides the error).
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    NotFound,
    InsufficientStock,
}

/// A line item the inventory cannot satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockViolation {
    pub item: LineItem,
    pub reason: ViolationReason,
    /// Units on hand when the violation was detected (`None` when the product is missing).
    pub available: Option<i64>,
}

impl From<StockViolation> for CartError {
    fn from(v: StockViolation) -> Self {
        match v.reason {
            ViolationReason::NotFound => CartError::ProductNotFound(v.item.product_id),
            ViolationReason::InsufficientStock => CartError::InsufficientStock {
                product_id: v.item.product_id,
                requested: v.item.quantity,
                available: v.available.unwrap_or(0),
            },
        }
    }
}

/// Read-only check of line items against current stock. Never mutates inventory.
#[derive(Clone)]
pub struct StockValidator {
    inventory: Arc<dyn InventoryGateway>,
    mode: ValidationMode,
}

impl core::fmt::Debug for StockValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockValidator")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl StockValidator {
    pub fn new(inventory: Arc<dyn InventoryGateway>, mode: ValidationMode) -> Self {
        Self { inventory, mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Check `items` in input order, re-reading a snapshot for each.
    ///
    /// Returns the violations found: empty means every item is satisfiable. In
    /// `FailFast` mode at most one violation is returned.
    pub async fn validate(&self, items: &[LineItem]) -> Result<Vec<StockViolation>, StoreError> {
        let mut violations = Vec::new();

        for item in items {
            let violation = match self.inventory.snapshot(item.product_id).await? {
                None => Some(StockViolation {
                    item: *item,
                    reason: ViolationReason::NotFound,
                    available: None,
                }),
                Some(snap) if !snap.covers(item.quantity) => Some(StockViolation {
                    item: *item,
                    reason: ViolationReason::InsufficientStock,
                    available: Some(snap.quantity_available),
                }),
                Some(_) => None,
            };

            if let Some(v) = violation {
                debug!(product_id = %v.item.product_id, reason = ?v.reason, "stock violation");
                violations.push(v);
                if self.mode == ValidationMode::FailFast {
                    break;
                }
            }
        }

        Ok(violations)
    }

    /// Validate and turn the first violation into a domain error.
    pub async fn check(&self, items: &[LineItem]) -> CartResult<()> {
        let violations = self.validate(items).await?;
        let Some(first) = violations.first().copied() else {
            return Ok(());
        };

        if violations.len() > 1 {
            warn!(
                count = violations.len(),
                products = ?violations.iter().map(|v| v.item.product_id.get()).collect::<Vec<_>>(),
                "multiple stock violations"
            );
        }
        Err(first.into())
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopcart_core::{CartError, CartResult, ProductId};

/// Catalog record: what a product is, what it costs, and how many units are on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity_in_stock: i64,
}

impl Product {
    /// Check the record before it is written to a catalog.
    pub fn validate(&self) -> CartResult<()> {
        if self.title.trim().is_empty() {
            return Err(CartError::malformed("title cannot be empty"));
        }
        if self.price.is_sign_negative() {
            return Err(CartError::malformed("price cannot be negative"));
        }
        if self.quantity_in_stock < 0 {
            return Err(CartError::malformed("quantity_in_stock cannot be negative"));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            product_id: self.id,
            quantity_available: self.quantity_in_stock,
            unit_price: self.price,
        }
    }
}

/// Point-in-time read of a product's available quantity.
///
/// Never cached by the checkout path: re-read at every validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub quantity_available: i64,
    pub unit_price: Decimal,
}

impl StockSnapshot {
    pub fn covers(&self, quantity: i64) -> bool {
        self.quantity_available >= quantity
    }
}

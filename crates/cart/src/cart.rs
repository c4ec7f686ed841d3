use serde::{Deserialize, Serialize};

use shopcart_core::{CartId, ProductId};

/// A (product, quantity) pair.
///
/// Incoming line items may carry any quantity; once inside a `Cart` the quantity is
/// always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(alias = "productID")]
    pub product_id: ProductId,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Shopping cart: unique products, positive quantities, ordered by product id.
///
/// Only `aggregator::merge` builds non-empty carts, which keeps the invariants in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    id: CartId,
    #[serde(rename = "products")]
    items: Vec<LineItem>,
}

impl Cart {
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    /// Rebuild a cart from stored rows, normalizing them through the aggregator.
    pub fn from_items(id: CartId, items: impl IntoIterator<Item = LineItem>) -> Self {
        let items: Vec<LineItem> = items.into_iter().collect();
        crate::aggregator::merge(&Self::empty(id), &items)
    }

    pub(crate) fn with_normalized_items(id: CartId, items: Vec<LineItem>) -> Self {
        Self { id, items }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<i64> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
    }

    /// Total units across all lines.
    pub fn total_items(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_product_id_field_is_accepted() {
        let item: LineItem = serde_json::from_str(r#"{"productID": 4, "quantity": 2}"#).unwrap();
        assert_eq!(item, LineItem::new(ProductId::new(4), 2));

        let item: LineItem = serde_json::from_str(r#"{"product_id": 4, "quantity": 2}"#).unwrap();
        assert_eq!(item.product_id, ProductId::new(4));
    }

    #[test]
    fn cart_serializes_items_as_products() {
        let cart = Cart::from_items(CartId::new(7), [LineItem::new(ProductId::new(1), 5)]);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "products": [{"product_id": 1, "quantity": 5}]})
        );
    }

    #[test]
    fn from_items_normalizes_duplicates_and_drops_non_positive() {
        let cart = Cart::from_items(
            CartId::new(1),
            [
                LineItem::new(ProductId::new(2), 1),
                LineItem::new(ProductId::new(2), 2),
                LineItem::new(ProductId::new(3), 0),
            ],
        );
        assert_eq!(cart.items(), &[LineItem::new(ProductId::new(2), 3)]);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.quantity_of(ProductId::new(3)), None);
    }
}

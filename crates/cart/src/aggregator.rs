//! Cart aggregation: fold incoming line items into a canonical cart.

use std::collections::BTreeMap;

use shopcart_core::ProductId;

use crate::cart::{Cart, LineItem};

/// Merge `incoming` into `existing`.
///
/// Quantities for the same product are summed (existing + every incoming occurrence);
/// lines whose total is not strictly positive are dropped. Merging is additive, so applying
/// the same items twice counts them twice. Pure: no I/O, no errors.
///
/// Running totals saturate at `i64::MAX` (and `i64::MIN`), so the additive law only holds
/// below that bound; such totals never pass stock validation anyway.
pub fn merge(existing: &Cart, incoming: &[LineItem]) -> Cart {
    let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();

    for item in existing.items().iter().chain(incoming) {
        let total = totals.entry(item.product_id).or_insert(0);
        *total = total.saturating_add(item.quantity);
    }

    let items = totals
        .into_iter()
        .filter(|(_, quantity)| *quantity > 0)
        .map(|(product_id, quantity)| LineItem::new(product_id, quantity))
        .collect();

    Cart::with_normalized_items(existing.id(), items)
}

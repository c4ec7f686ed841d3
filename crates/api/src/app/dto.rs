use rust_decimal::Decimal;
use serde::Deserialize;

use shopcart_cart::LineItem;
use shopcart_core::{CartId, ProductId};
use shopcart_inventory::Product;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub id: CartId,
    #[serde(default)]
    pub products: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity_in_stock: i64,
}

impl From<CreateProductRequest> for Product {
    fn from(r: CreateProductRequest) -> Self {
        Product {
            id: r.id,
            title: r.title,
            price: r.price,
            quantity_in_stock: r.quantity_in_stock,
        }
    }
}

/// Full replacement of a product; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity_in_stock: i64,
}

impl UpdateProductRequest {
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            title: self.title,
            price: self.price,
            quantity_in_stock: self.quantity_in_stock,
        }
    }
}

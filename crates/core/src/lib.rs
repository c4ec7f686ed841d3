//! `shopcart-core`: shared building blocks for the cart and checkout service.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{CartError, CartResult, StoreError};
pub use id::{CartId, ProductId};

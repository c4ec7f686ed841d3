//! Cart consistency and checkout.
//!
//! Control flow, leaf-first:
//!
//! ```text
//! merge (aggregator) -> StockValidator (add-to-cart and again at checkout)
//!                    -> CheckoutCoordinator (checkout only; sole inventory writer)
//! ```
//!
//! Collaborators (`InventoryGateway`, `CartStore`) are injected as trait objects.

pub mod aggregator;
pub mod cart;
pub mod checkout;
pub mod guard;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod service;
pub mod store;
pub mod validator;

pub use aggregator::merge;
pub use cart::{Cart, LineItem};
pub use checkout::{CheckoutCoordinator, CheckoutResult, CheckoutState, Reconciliation, ReceiptLine};
pub use guard::{CartGuard, CartGuards};
#[cfg(feature = "postgres")]
pub use postgres::PostgresCartStore;
pub use service::CartService;
pub use store::{CartStore, InMemoryCartStore};
pub use validator::{StockValidator, StockViolation, ValidationMode, ViolationReason};

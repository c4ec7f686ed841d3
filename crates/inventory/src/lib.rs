//! Inventory and product catalog.
//!
//! Holds the catalog record, the stock snapshot read by validation, and the two
//! capability traits the checkout path consumes (`InventoryGateway`) or the catalog
//! endpoints use (`ProductCatalog`). Backends live alongside: an in-memory store for
//! tests/dev and, behind the `postgres` feature, a Postgres store.

pub mod gateway;
pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod product;

pub use gateway::{DecrementOutcome, InventoryGateway, ProductCatalog};
pub use in_memory::InMemoryInventory;
#[cfg(feature = "postgres")]
pub use postgres::PostgresInventory;
pub use product::{Product, StockSnapshot};

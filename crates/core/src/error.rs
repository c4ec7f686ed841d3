//! Domain error model.

use thiserror::Error;

use crate::id::{CartId, ProductId};

/// Result type used across the cart and checkout layer.
pub type CartResult<T> = Result<T, CartError>;

/// Failure of a collaborator (inventory backend, cart storage).
///
/// Only infrastructure problems belong here; "not found" and "not enough stock" are
/// ordinary outcomes reported through return values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// A stored record violates an invariant (e.g. negative stock read back).
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The caller passed an argument the backend cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Domain-level error for cart and checkout operations.
///
/// Every variant except `Internal` is a deterministic business outcome that the transport
/// layer maps one-to-one onto a response code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The request could not be interpreted (bad body, bad id, empty cart).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("cart {0} not found")]
    CartNotFound(CartId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Another checkout (or cart update) for the same cart is in flight. Retryable.
    #[error("checkout already in progress for cart {0}")]
    CheckoutConflict(CartId),

    /// A collaborator failed; the only variant wrapping an underlying error.
    #[error("internal failure: {0}")]
    Internal(#[from] StoreError),
}

impl CartError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CheckoutConflict(_) | Self::Internal(_))
    }
}

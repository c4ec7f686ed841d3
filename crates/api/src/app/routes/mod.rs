use axum::{routing::get, Router};

pub mod admin;
pub mod cart;
pub mod products;
pub mod system;

/// Router for every HTTP endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/cart", cart::router())
        .nest("/products", products::router())
        .nest("/admin", admin::router())
}

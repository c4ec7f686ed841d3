use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shopcart_core::CartId;

use crate::app::errors::{self, Endpoint};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(add_to_cart))
        .route("/:cart_id", get(get_cart))
        .route("/:cart_id/checkout", post(checkout))
}

pub async fn add_to_cart(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AddToCartRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.carts.add_items(body.id, &body.products).await {
        Ok(cart) => (StatusCode::CREATED, Json(cart)).into_response(),
        Err(e) => errors::cart_error_to_response(e, Endpoint::AddToCart),
    }
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(cart_id): Path<String>,
) -> axum::response::Response {
    let cart_id: CartId = match cart_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::cart_error_to_response(e, Endpoint::GetCart),
    };

    match services.carts.get(cart_id).await {
        Ok(cart) => Json(cart).into_response(),
        Err(e) => errors::cart_error_to_response(e, Endpoint::GetCart),
    }
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Path(cart_id): Path<String>,
) -> axum::response::Response {
    let cart_id: CartId = match cart_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::cart_error_to_response(e, Endpoint::Checkout),
    };

    match services.carts.checkout(cart_id).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => errors::cart_error_to_response(e, Endpoint::Checkout),
    }
}

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shopcart_core::CartError;

/// Which endpoint an error came from; the same domain error maps differently per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    AddToCart,
    GetCart,
    Checkout,
    Catalog,
}

pub fn cart_error_to_response(err: CartError, endpoint: Endpoint) -> axum::response::Response {
    match err {
        CartError::MalformedRequest(msg) => json_error(StatusCode::BAD_REQUEST, "malformed_request", msg),
        CartError::CartNotFound(_) => json_error(
            StatusCode::NOT_FOUND,
            "cart_not_found",
            "Shopping cart was not found.",
        ),
        CartError::ProductNotFound(_) => match endpoint {
            Endpoint::AddToCart => json_error(
                StatusCode::NOT_FOUND,
                "product_not_found",
                "One of the cart products was not found.",
            ),
            _ => json_error(StatusCode::NOT_FOUND, "product_not_found", "Product not found."),
        },
        CartError::InsufficientStock { .. } => match endpoint {
            Endpoint::Checkout => json_error(
                StatusCode::BAD_REQUEST,
                "not_enough_stock",
                "A cart product does not have enough stock. This cart is invalid.",
            ),
            _ => json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "not_enough_stock",
                "One of the cart products does not have sufficient stock.",
            ),
        },
        CartError::CheckoutConflict(_) => json_error(
            StatusCode::CONFLICT,
            "checkout_conflict",
            "The cart is being checked out by another request. Retry shortly.",
        ),
        CartError::Internal(e) => {
            tracing::error!(error = %e, ?endpoint, "internal failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_server_error",
                internal_message(endpoint),
            )
        }
    }
}

fn internal_message(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::AddToCart => "There was an error when trying to create a shopping cart.",
        Endpoint::GetCart => "There was an error when trying to get the shopping cart.",
        Endpoint::Checkout => "There was an error when trying to checkout.",
        Endpoint::Catalog => "There was an error when accessing the product catalog.",
    }
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "malformed_request", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shopcart_core::{CartError, ProductId};
use shopcart_inventory::Product;

use crate::app::errors::{self, Endpoint};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route(
            "/:product_id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse()
        .map_err(|e| errors::cart_error_to_response(e, Endpoint::Catalog))
}

fn not_found(product_id: ProductId) -> axum::response::Response {
    errors::cart_error_to_response(CartError::ProductNotFound(product_id), Endpoint::Catalog)
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let product = Product::from(body);
    if let Err(e) = product.validate() {
        return errors::cart_error_to_response(e, Endpoint::Catalog);
    }

    match services.catalog.create(product.clone()).await {
        Ok(true) => (StatusCode::CREATED, Json(product)).into_response(),
        Ok(false) => errors::json_error(
            StatusCode::CONFLICT,
            "product_exists",
            format!("product {} already exists", product.id),
        ),
        Err(e) => errors::cart_error_to_response(e.into(), Endpoint::Catalog),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list().await {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::cart_error_to_response(e.into(), Endpoint::Catalog),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get(product_id).await {
        Ok(Some(product)) => Json(product).into_response(),
        Ok(None) => not_found(product_id),
        Err(e) => errors::cart_error_to_response(e.into(), Endpoint::Catalog),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    body: Result<Json<dto::UpdateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let product_id = match parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let product = body.into_product(product_id);
    if let Err(e) = product.validate() {
        return errors::cart_error_to_response(e, Endpoint::Catalog);
    }

    match services.catalog.update(product).await {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => not_found(product_id),
        Err(e) => errors::cart_error_to_response(e.into(), Endpoint::Catalog),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.delete(product_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(product_id),
        Err(e) => errors::cart_error_to_response(e.into(), Endpoint::Catalog),
    }
}

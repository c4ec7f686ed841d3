use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use shopcart_cart::Reconciliation;

use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/reconciliations", get(list_reconciliations))
}

/// Entries an operator still has to resolve by hand.
pub async fn list_reconciliations(
    Extension(services): Extension<Arc<AppServices>>,
) -> Json<Vec<Reconciliation>> {
    Json(services.carts.pending_reconciliations())
}

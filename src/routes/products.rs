use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::state::AppState;

use super::error_response;

// GET /api/v1/products
pub async fn list_products(State(app_state): State<AppState>) -> Response {
    match app_state.stripe.list_products_with_prices().await {
        Ok(products) => Json(products).into_response(),
        Err(err) => {
            error!(%err, "product listing failed");
            error_response(err.into())
        }
    }
}

pub mod checkout;
pub mod customers;
pub mod health;
pub mod products;
pub mod subscriptions;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::responses::JsonResponse;
use crate::services::ServiceError;
use crate::state::AppState;

/// Everything mounted under /api/v1.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/customers/create", post(customers::create_customer))
        .route("/customers", get(customers::list_customers))
        .route("/customers/{id}", get(customers::get_customer))
        .route("/customers/{id}/details", get(customers::customer_details))
        .route(
            "/subscriptions/create",
            post(subscriptions::create_subscription),
        )
        .route("/subscriptions/{id}", get(subscriptions::get_subscription))
        .route(
            "/subscriptions/{id}/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route("/products", get(products::list_products))
        .route("/checkout-session", post(checkout::create_checkout_session))
        .route(
            "/checkout-session/{id}",
            get(checkout::get_checkout_session),
        )
}

fn error_response(err: ServiceError) -> Response {
    let msg = err.to_string();
    match err {
        ServiceError::InvalidUserId(_) => JsonResponse::bad_request(&msg).into_response(),
        ServiceError::NotFound(_) => JsonResponse::not_found(&msg).into_response(),
        ServiceError::Conflict(_) => JsonResponse::conflict(&msg).into_response(),
        ServiceError::Stripe(_) | ServiceError::Storage(_) => {
            JsonResponse::server_error(&msg).into_response()
        }
    }
}

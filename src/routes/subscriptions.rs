use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::services::ServiceError;
use crate::state::AppState;

use super::error_response;

#[derive(Deserialize)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub price_id: String,
}

/// Accepts either an internal user UUID or a Stripe customer id in
/// `customer_id` and yields the internal user id.
async fn resolve_user_id(app_state: &AppState, customer_id: &str) -> Result<Uuid, ServiceError> {
    if let Ok(id) = Uuid::parse_str(customer_id) {
        return Ok(id);
    }
    let user = app_state
        .users
        .get_user_by_stripe_customer_id(customer_id)
        .await
        .map_err(|_| ServiceError::InvalidUserId(customer_id.to_string()))?;
    Ok(user.id)
}

// POST /api/v1/subscriptions/create
pub async fn create_subscription(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> Response {
    if payload.customer_id.is_empty() || payload.price_id.is_empty() {
        return JsonResponse::bad_request("customer_id and price_id are required")
            .into_response();
    }

    let user_id = match resolve_user_id(&app_state, &payload.customer_id).await {
        Ok(id) => id,
        Err(err) => return error_response(err),
    };
    let user = match app_state.users.get_user(user_id).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    let Some(stripe_customer_id) = user.stripe_customer_id.as_deref() else {
        return JsonResponse::bad_request("User has no linked Stripe customer").into_response();
    };

    let stripe_subscription = match app_state
        .stripe
        .create_subscription(stripe_customer_id, &payload.price_id)
        .await
    {
        Ok(sub) => sub,
        Err(err) => {
            error!(%err, customer_id = stripe_customer_id, "stripe subscription creation failed");
            return error_response(err.into());
        }
    };

    match app_state
        .subscriptions
        .create_subscription(&user_id.to_string(), &payload.price_id)
        .await
    {
        Ok(subscription) => {
            info!(%user_id, stripe_id = %stripe_subscription.id, "subscription created");
            Json(json!({
                "stripe_subscription": stripe_subscription,
                "subscription": subscription,
            }))
            .into_response()
        }
        Err(err) => {
            error!(%err, %user_id, "persisting subscription failed");
            error_response(err)
        }
    }
}

// GET /api/v1/subscriptions/{id}
pub async fn get_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::bad_request("Invalid subscription id").into_response(),
    };

    match app_state.subscriptions.get_subscription(id).await {
        Ok(sub) => Json(sub).into_response(),
        Err(err) => error_response(err),
    }
}

// POST /api/v1/subscriptions/{id}/cancel
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match app_state.subscriptions.cancel_subscription(&id).await {
        Ok(()) => Json(json!({ "status": "canceled" })).into_response(),
        Err(err) => {
            error!(%err, %id, "subscription cancel failed");
            error_response(err)
        }
    }
}

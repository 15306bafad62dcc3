use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::state::AppState;

use super::error_response;

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: String,
}

// POST /api/v1/customers/create
pub async fn create_customer(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Response {
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return JsonResponse::bad_request("A valid email is required").into_response();
    }
    if payload.name.trim().is_empty() {
        return JsonResponse::bad_request("Name is required").into_response();
    }

    match app_state
        .users
        .create_customer(email, payload.name.trim())
        .await
    {
        Ok((customer, user)) => {
            Json(json!({ "stripe_customer": customer, "user": user })).into_response()
        }
        Err(err) => {
            error!(%err, email, "customer creation failed");
            error_response(err)
        }
    }
}

// GET /api/v1/customers
pub async fn list_customers(State(app_state): State<AppState>) -> Response {
    match app_state.users.list_users().await {
        Ok(users) => Json(users).into_response(),
        Err(err) => {
            error!(%err, "listing users failed");
            error_response(err)
        }
    }
}

// GET /api/v1/customers/{id}
pub async fn get_customer(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let user_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::bad_request("Invalid user id").into_response(),
    };

    match app_state.users.get_user(user_id).await {
        Ok(user) => Json(user).into_response(),
        Err(err) => error_response(err),
    }
}

// GET /api/v1/customers/{id}/details
pub async fn customer_details(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let user_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return JsonResponse::bad_request("Invalid user id").into_response(),
    };

    match app_state
        .customer_details
        .get_customer_details(user_id)
        .await
    {
        Ok(details) => Json(details).into_response(),
        Err(err) => {
            error!(%err, %user_id, "customer details lookup failed");
            error_response(err)
        }
    }
}

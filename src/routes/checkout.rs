use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::state::AppState;

use super::error_response;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub price_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub session_url: String,
}

/// Appends `user_id` when known and ensures the `{CHECKOUT_SESSION_ID}`
/// placeholder is present, so the landing page can retrieve the session.
fn build_success_url(base: &str, user_id: Option<Uuid>) -> String {
    let mut url = base.to_string();
    if let Some(user_id) = user_id {
        let sep = if url.contains('?') { '&' } else { '?' };
        url = format!("{url}{sep}user_id={user_id}");
    }
    if !url.contains("{CHECKOUT_SESSION_ID}") {
        let sep = if url.contains('?') { '&' } else { '?' };
        url = format!("{url}{sep}session_id={{CHECKOUT_SESSION_ID}}");
    }
    url
}

// POST /api/v1/checkout-session
pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    Json(payload): Json<CheckoutSessionRequest>,
) -> Response {
    if payload.price_id.is_empty() {
        return JsonResponse::bad_request("priceId is required").into_response();
    }

    let user_id = match payload.user_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => return JsonResponse::bad_request("invalid userId").into_response(),
        },
        None => None,
    };

    let config = &app_state.config;
    if config.app_success_url.is_empty() || config.app_cancel_url.is_empty() {
        error!("checkout requested but APP_SUCCESS_URL / APP_CANCEL_URL are not configured");
        return JsonResponse::server_error("success_url and cancel_url must be configured")
            .into_response();
    }
    let success_url = build_success_url(&config.app_success_url, user_id);

    match app_state
        .subscriptions
        .create_checkout_session(
            &payload.price_id,
            user_id,
            payload.customer_id.clone(),
            &success_url,
            &config.app_cancel_url,
        )
        .await
    {
        Ok(session) => match session.url {
            Some(session_url) => {
                info!(session_id = %session.id, "checkout session created");
                Json(CheckoutSessionResponse { session_url }).into_response()
            }
            None => {
                error!(session_id = %session.id, "checkout session carries no redirect url");
                JsonResponse::server_error("processor returned no redirect URL").into_response()
            }
        },
        Err(err) => {
            error!(%err, price_id = %payload.price_id, "checkout session creation failed");
            error_response(err)
        }
    }
}

// GET /api/v1/checkout-session/{id}
pub async fn get_checkout_session(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if id.is_empty() {
        return JsonResponse::bad_request("session_id required").into_response();
    }

    let session = match app_state.stripe.retrieve_checkout_session(&id).await {
        Ok(session) => session,
        Err(err) => {
            error!(%err, session_id = %id, "checkout session retrieval failed");
            return error_response(err.into());
        }
    };

    // The purchaser may not exist locally yet when checkout was anonymous.
    let user = match session.customer_id.as_deref() {
        Some(customer_id) => {
            let email = session.customer_email.as_deref().unwrap_or_default();
            let name = session.customer_name.as_deref().unwrap_or_default();
            match app_state
                .users
                .upsert_from_checkout(email, name, customer_id)
                .await
            {
                Ok(user) => Some(user),
                Err(err) => {
                    error!(%err, customer_id, "failed to persist user after checkout");
                    return error_response(err);
                }
            }
        }
        None => None,
    };

    Json(json!({ "session": session, "user": user })).into_response()
}

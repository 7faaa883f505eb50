//! services/api/src/web/billing.rs
//!
//! Handlers for starting a subscription checkout and receiving the payment
//! provider's webhooks.

use crate::adapters::analytics::EventKind;
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::Json,
};
use diet_planner_core::billing::{self, ReconcileOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Deserialize, ToSchema)]
pub struct CheckoutSessionPayload {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Start a subscription checkout and return the provider's redirect URL.
///
/// The success and cancel pages are built from the request's `Origin`,
/// falling back to the configured public URL.
#[utoipa::path(
    post,
    path = "/api/create-checkout-session",
    request_body = CheckoutSessionPayload,
    responses(
        (status = 200, description = "Checkout created", body = CheckoutSessionResponse),
        (status = 400, description = "Missing user_id or email"),
        (status = 500, description = "Checkout could not be created")
    )
)]
pub async fn create_checkout_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutSessionPayload>,
) -> Result<Json<CheckoutSessionResponse>, (StatusCode, String)> {
    let email = payload
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "user_id and email are required".to_string(),
            )
        })?;
    let user_id = payload
        .user_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id.trim()).ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "user_id and email are required".to_string(),
            )
        })?;

    let origin = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|origin| !origin.is_empty())
        .unwrap_or(app_state.config.public_app_url.as_str());

    match billing::start_checkout(
        app_state.db.as_ref(),
        app_state.payments.as_ref(),
        user_id,
        &email,
        origin,
    )
    .await
    {
        Ok(url) => {
            app_state
                .analytics
                .track(EventKind::SubscriptionStarted, Some(user_id), origin);
            Ok(Json(CheckoutSessionResponse { url }))
        }
        Err(e) => {
            error!(%user_id, "Failed to create checkout session: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not start checkout. Please try again.".to_string(),
            ))
        }
    }
}

/// Receive a payment provider webhook.
///
/// The raw body is checked against the `stripe-signature` header before
/// anything is decoded.
#[utoipa::path(
    post,
    path = "/api/stripe-webhook",
    request_body(content = String, content_type = "application/json", description = "The raw event body."),
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature"),
        (status = 500, description = "Event could not be applied")
    ),
    params(
        ("stripe-signature" = String, Header, description = "Provider signature of the raw body.")
    )
)]
pub async fn stripe_webhook_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, String)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Missing stripe-signature header".to_string(),
            )
        })?;

    let event = app_state
        .payments
        .verify_webhook(&body, signature)
        .map_err(|e| {
            warn!("Rejected webhook: {}", e);
            (
                StatusCode::BAD_REQUEST,
                "Webhook signature verification failed".to_string(),
            )
        })?;

    match billing::reconcile(app_state.db.as_ref(), app_state.payments.as_ref(), event).await {
        Ok(outcome) => {
            if outcome == ReconcileOutcome::NoMatchingRecord {
                info!("Webhook acknowledged without a matching subscription");
            }
            Ok(Json(WebhookAck { received: true }))
        }
        Err(e) => {
            error!("Failed to apply webhook: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Webhook handler failed".to_string(),
            ))
        }
    }
}

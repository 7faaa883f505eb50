//! services/api/src/adapters/stripe.rs
//!
//! This module contains the adapter for the Stripe payment API.
//! It implements the `PaymentService` port from the `core` crate: customer and
//! checkout-session creation over Stripe's form-encoded REST API, and webhook
//! signature verification and decoding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diet_planner_core::{
    billing::BillingEvent,
    domain::{CheckoutRequest, ProviderSubscription},
    ports::{PaymentService, PortError, PortResult},
};
use ring::hmac;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Maximum age of a webhook signature, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct StripeAdapter {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    price_id: String,
}

impl StripeAdapter {
    pub fn new(
        api_base: String,
        secret_key: String,
        webhook_secret: String,
        price_id: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
            price_id,
        }
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> PortResult<T> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Stripe returned {}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PortError::InvalidResponse(e.to_string()))
    }
}

//=========================================================================================
// Stripe wire types
//=========================================================================================

#[derive(Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    url: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    status: String,
    current_period_end: Option<i64>,
}

impl SubscriptionObject {
    fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: Value,
}

//=========================================================================================
// Webhook verification and decoding
//=========================================================================================

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>,...`) against
/// the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> PortResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PortError::Unauthorized)?;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PortError::Unauthorized);
    }

    let mut signed_payload = format!("{}.", timestamp).into_bytes();
    signed_payload.extend_from_slice(payload);

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let valid = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|tag| hmac::verify(&key, &signed_payload, &tag).is_ok())
            .unwrap_or(false)
    });

    if valid {
        Ok(())
    } else {
        Err(PortError::Unauthorized)
    }
}

fn invoice_subscription_id(invoice: &Value) -> Option<String> {
    invoice
        .get("subscription")
        .and_then(Value::as_str)
        .or_else(|| {
            invoice
                .pointer("/parent/subscription_details/subscription")
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// Decodes a webhook body into the events the billing flow cares about.
pub fn parse_event(payload: &[u8]) -> PortResult<BillingEvent> {
    let envelope: EventEnvelope =
        serde_json::from_slice(payload).map_err(|e| PortError::InvalidResponse(e.to_string()))?;

    let subscription = |object: Value| -> PortResult<SubscriptionObject> {
        serde_json::from_value(object).map_err(|e| PortError::InvalidResponse(e.to_string()))
    };

    let event = match envelope.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let sub = subscription(envelope.data.object)?;
            BillingEvent::SubscriptionChanged {
                current_period_end: sub.period_end(),
                customer_id: sub.customer,
                subscription_id: sub.id,
                status: sub.status,
            }
        }
        "customer.subscription.deleted" => {
            let sub = subscription(envelope.data.object)?;
            BillingEvent::SubscriptionDeleted {
                current_period_end: sub.period_end(),
                customer_id: sub.customer,
            }
        }
        "invoice.payment_succeeded" | "invoice.payment_failed" => {
            match invoice_subscription_id(&envelope.data.object) {
                Some(subscription_id) if envelope.event_type == "invoice.payment_succeeded" => {
                    BillingEvent::InvoicePaid { subscription_id }
                }
                Some(subscription_id) => BillingEvent::InvoiceFailed { subscription_id },
                None => BillingEvent::Ignored(envelope.event_type),
            }
        }
        _ => BillingEvent::Ignored(envelope.event_type),
    };

    Ok(event)
}

//=========================================================================================
// `PaymentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentService for StripeAdapter {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> PortResult<String> {
        let form = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];
        let customer: CustomerObject = self
            .send(
                self.http
                    .post(format!("{}/customers", self.api_base))
                    .form(&form),
            )
            .await?;
        Ok(customer.id)
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> PortResult<String> {
        let form = [
            ("customer", request.customer_id.clone()),
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        let session: CheckoutSessionObject = self
            .send(
                self.http
                    .post(format!("{}/checkout/sessions", self.api_base))
                    .form(&form),
            )
            .await?;

        session.url.ok_or_else(|| {
            PortError::InvalidResponse("Checkout session has no redirect URL".to_string())
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> PortResult<ProviderSubscription> {
        let sub: SubscriptionObject = self
            .send(
                self.http
                    .get(format!("{}/subscriptions/{}", self.api_base, subscription_id)),
            )
            .await?;

        Ok(ProviderSubscription {
            current_period_end: sub.period_end(),
            id: sub.id,
            customer_id: sub.customer,
            status: sub.status,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<BillingEvent> {
        verify_signature(
            payload,
            signature,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

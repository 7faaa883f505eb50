//! crates/diet_planner_core/src/billing.rs
//!
//! Checkout and subscription mirroring. The application never decides a
//! subscription status itself: it stores whatever the payment provider last
//! reported for the customer.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{CheckoutRequest, SubscriptionUpdate};
use crate::ports::{DatabaseService, PaymentService, PortResult};

pub const SUCCESS_PATH: &str = "/success";
pub const CANCEL_PATH: &str = "/billing-cancelled";

/// A verified webhook event from the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// `customer.subscription.created` / `customer.subscription.updated`.
    SubscriptionChanged {
        customer_id: String,
        subscription_id: String,
        status: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    /// `customer.subscription.deleted`.
    SubscriptionDeleted {
        customer_id: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    /// `invoice.payment_succeeded`.
    InvoicePaid { subscription_id: String },
    /// `invoice.payment_failed`.
    InvoiceFailed { subscription_id: String },
    /// Any other event type, or an invoice without a subscription.
    Ignored(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    NoMatchingRecord,
    Ignored,
}

/// Starts a subscription checkout and returns the provider's redirect URL.
///
/// The first attempt creates the provider customer and an `incomplete`
/// record; later attempts reuse the stored customer. When two first attempts
/// race, the stored record decides which customer the checkout uses.
pub async fn start_checkout(
    db: &dyn DatabaseService,
    payments: &dyn PaymentService,
    user_id: Uuid,
    email: &str,
    origin: &str,
) -> PortResult<String> {
    let customer_id = match db.get_subscription(user_id).await? {
        Some(record) => record.customer_id,
        None => {
            let customer_id = payments.create_customer(email, user_id).await?;
            let record = db.create_pending_subscription(user_id, &customer_id).await?;
            if record.customer_id != customer_id {
                warn!(
                    %user_id,
                    orphaned = %customer_id,
                    stored = %record.customer_id,
                    "Concurrent checkout already stored a customer"
                );
            } else {
                info!(%user_id, %customer_id, "Created payment customer");
            }
            record.customer_id
        }
    };

    let origin = origin.trim_end_matches('/');
    let request = CheckoutRequest {
        customer_id,
        user_id,
        success_url: format!("{}{}", origin, SUCCESS_PATH),
        cancel_url: format!("{}{}", origin, CANCEL_PATH),
    };

    payments.create_checkout_session(&request).await
}

/// Mirrors a provider event into the subscription store. Last event wins.
pub async fn reconcile(
    db: &dyn DatabaseService,
    payments: &dyn PaymentService,
    event: BillingEvent,
) -> PortResult<ReconcileOutcome> {
    let (customer_id, update) = match event {
        BillingEvent::SubscriptionChanged {
            customer_id,
            subscription_id,
            status,
            current_period_end,
        } => (
            customer_id,
            SubscriptionUpdate {
                subscription_id: Some(subscription_id),
                status,
                current_period_end,
            },
        ),
        BillingEvent::SubscriptionDeleted {
            customer_id,
            current_period_end,
        } => (
            customer_id,
            SubscriptionUpdate {
                subscription_id: None,
                status: "canceled".to_string(),
                current_period_end,
            },
        ),
        BillingEvent::InvoicePaid { subscription_id } => {
            let subscription = payments.retrieve_subscription(&subscription_id).await?;
            (
                subscription.customer_id,
                SubscriptionUpdate {
                    subscription_id: None,
                    status: subscription.status,
                    current_period_end: subscription.current_period_end,
                },
            )
        }
        BillingEvent::InvoiceFailed { subscription_id } => {
            let subscription = payments.retrieve_subscription(&subscription_id).await?;
            (
                subscription.customer_id,
                SubscriptionUpdate {
                    subscription_id: None,
                    status: subscription.status,
                    current_period_end: None,
                },
            )
        }
        BillingEvent::Ignored(event_type) => {
            info!("Unhandled billing event type: {}", event_type);
            return Ok(ReconcileOutcome::Ignored);
        }
    };

    if db
        .update_subscription_by_customer(&customer_id, &update)
        .await?
    {
        info!(%customer_id, status = %update.status, "Subscription status mirrored");
        Ok(ReconcileOutcome::Applied)
    } else {
        warn!(%customer_id, "No subscription record for customer");
        Ok(ReconcileOutcome::NoMatchingRecord)
    }
}

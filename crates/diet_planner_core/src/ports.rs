//! crates/diet_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! estimator, the entitlement gate and the billing flow independent of the
//! database, the AI provider and the payment provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::billing::BillingEvent;
use crate::domain::{
    AiStatusReport, CheckoutRequest, DietRecord, MealPlan, ProviderSubscription,
    SubscriptionRecord, SubscriptionUpdate, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid response from external service: {0}")]
    InvalidResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Onboarding profile ---
    async fn upsert_profile(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()>;

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>>;

    // --- Diet plans ---
    async fn save_diet(&self, user_id: Uuid, plan: &MealPlan) -> PortResult<DietRecord>;

    async fn latest_diet(&self, user_id: Uuid) -> PortResult<Option<DietRecord>>;

    async fn list_diets(&self, user_id: Uuid) -> PortResult<Vec<DietRecord>>;

    /// Fails with `NotFound` when the record does not exist or belongs to someone else.
    async fn delete_diet(&self, user_id: Uuid, diet_id: Uuid) -> PortResult<()>;

    // --- Subscriptions ---
    async fn get_subscription(&self, user_id: Uuid) -> PortResult<Option<SubscriptionRecord>>;

    /// Inserts the `incomplete` record created on a user's first checkout attempt.
    /// If the user already has a record it is returned unchanged.
    async fn create_pending_subscription(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> PortResult<SubscriptionRecord>;

    /// Applies a provider update to the record owning `customer_id`.
    /// Returns `false` when no such record exists.
    async fn update_subscription_by_customer(
        &self,
        customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> PortResult<bool>;
}

#[async_trait]
pub trait PlanGenerationService: Send + Sync {
    /// Asks the language model for a plan. Any failure, including a body that
    /// does not carry `totalCalories` and `meals`, is an error.
    async fn generate_plan(&self, profile: &UserProfile) -> PortResult<MealPlan>;

    /// Probes whether the configured key can reach the model.
    async fn check_status(&self) -> AiStatusReport;
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Creates a provider customer and returns its id.
    async fn create_customer(&self, email: &str, user_id: Uuid) -> PortResult<String>;

    /// Creates a subscription checkout session and returns its redirect URL.
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> PortResult<String>;

    async fn retrieve_subscription(&self, subscription_id: &str)
        -> PortResult<ProviderSubscription>;

    /// Verifies the webhook signature and decodes the event.
    /// A bad signature is `Unauthorized`; an undecodable body is `InvalidResponse`.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<BillingEvent>;
}

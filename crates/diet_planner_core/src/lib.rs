pub mod billing;
pub mod domain;
pub mod entitlement;
pub mod estimator;
pub mod planner;
pub mod ports;

pub use billing::{BillingEvent, ReconcileOutcome};
pub use domain::{
    ActivityLevel, AiStatus, AiStatusReport, CheckoutRequest, DietHistory, DietRecord, Goal,
    Meal, MealPlan, ProfileInput, ProviderSubscription, SubscriptionRecord, SubscriptionStatus,
    SubscriptionUpdate, UserProfile,
};
pub use entitlement::{is_day_locked, EntitlementView, PLAN_DAYS};
pub use planner::{GeneratedPlan, PlanSource};
pub use ports::{DatabaseService, PaymentService, PlanGenerationService, PortError, PortResult};

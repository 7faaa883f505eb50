//! crates/diet_planner_core/src/domain.rs
//!
//! Defines the core data structures for the application: the onboarding
//! profile, the generated meal plan, and the mirrored subscription record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_WEIGHT_KG: f64 = 65.0;
pub const DEFAULT_HEIGHT_CM: f64 = 165.0;
pub const DEFAULT_AGE_YEARS: f64 = 25.0;
pub const DEFAULT_MEALS_PER_DAY: u8 = 5;
pub const MAX_MEALS_PER_DAY: u8 = 6;

//=========================================================================================
// Profile
//=========================================================================================

/// Self-reported activity level, each mapped to a fixed TDEE multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    High,
    Extra,
}

impl ActivityLevel {
    /// Matches the labels sent by the onboarding forms, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "sedentary" | "low" => Some(Self::Sedentary),
            "light" | "lightlyactive" | "lightly_active" => Some(Self::Light),
            "moderate" | "moderatelyactive" | "moderately_active" => Some(Self::Moderate),
            "high" | "veryactive" | "very_active" => Some(Self::High),
            "extra" | "extraactive" | "extra_active" => Some(Self::Extra),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::High => 1.725,
            Self::Extra => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl Goal {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "lose" | "weightloss" | "weight_loss" => Some(Self::Lose),
            "maintain" | "maintainweight" | "maintain_weight" | "maintenance" => {
                Some(Self::Maintain)
            }
            "gain" | "musclegain" | "muscle_gain" => Some(Self::Gain),
            _ => None,
        }
    }

    /// Daily kcal offset applied after the activity multiplier.
    pub fn calorie_adjustment(self) -> f64 {
        match self {
            Self::Lose => -500.0,
            Self::Maintain => 0.0,
            Self::Gain => 300.0,
        }
    }
}

/// A fully coerced user profile. Every field holds a usable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub age: f64,
    pub weight: f64,
    pub height: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    pub meals_per_day: u8,
    pub restrictions: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE_YEARS,
            weight: DEFAULT_WEIGHT_KG,
            height: DEFAULT_HEIGHT_CM,
            activity_level: ActivityLevel::Moderate,
            goal: Goal::Maintain,
            meals_per_day: DEFAULT_MEALS_PER_DAY,
            restrictions: String::new(),
        }
    }
}

/// The questionnaire as it arrives over the wire. Every field is optional and
/// loosely typed; numbers may be JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<f64>))]
    pub age: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<f64>))]
    pub weight: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<f64>))]
    pub height: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub goal: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub activity_level: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<u8>))]
    pub meals_per_day: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub restrictions: Option<Value>,
}

impl From<ProfileInput> for UserProfile {
    fn from(input: ProfileInput) -> Self {
        let meals_per_day = number(input.meals_per_day.as_ref())
            .map(|n| n.round().clamp(1.0, f64::from(MAX_MEALS_PER_DAY)) as u8)
            .unwrap_or(DEFAULT_MEALS_PER_DAY);

        Self {
            age: positive(input.age.as_ref()).unwrap_or(DEFAULT_AGE_YEARS),
            weight: positive(input.weight.as_ref()).unwrap_or(DEFAULT_WEIGHT_KG),
            height: positive(input.height.as_ref()).unwrap_or(DEFAULT_HEIGHT_CM),
            activity_level: text(input.activity_level.as_ref())
                .and_then(ActivityLevel::from_label)
                .unwrap_or(ActivityLevel::Moderate),
            goal: text(input.goal.as_ref())
                .and_then(Goal::from_label)
                .unwrap_or(Goal::Maintain),
            meals_per_day,
            restrictions: restrictions_text(input.restrictions.as_ref()),
        }
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn positive(value: Option<&Value>) -> Option<f64> {
    number(value).filter(|n| *n > 0.0)
}

fn text(value: Option<&Value>) -> Option<&str> {
    value?.as_str()
}

// Forms send free text; some clients send a list of tags instead.
fn restrictions_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

//=========================================================================================
// Meal plan
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub name: String,
    pub time: String,
    pub calories: u32,
    pub foods: Vec<String>,
    /// Only filled in the quick-start preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_steps: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub total_calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
    pub meals: Vec<Meal>,
}

/// A meal plan persisted for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DietRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: MealPlan,
    pub created_at: DateTime<Utc>,
}

/// A user's saved plans, newest first, with the summary figures shown on the
/// history screen.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DietHistory {
    pub diets: Vec<DietRecord>,
    pub average_calories: u32,
    pub days_since_first: i64,
}

impl DietHistory {
    pub fn from_records(mut diets: Vec<DietRecord>, now: DateTime<Utc>) -> Self {
        diets.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let average_calories = if diets.is_empty() {
            0
        } else {
            let sum: f64 = diets.iter().map(|d| f64::from(d.plan.total_calories)).sum();
            (sum / diets.len() as f64).round() as u32
        };

        let days_since_first = diets
            .last()
            .map(|first| {
                let seconds = (now - first.created_at).num_seconds().abs();
                (seconds + 86_399) / 86_400
            })
            .unwrap_or(0);

        Self {
            diets,
            average_calories,
            days_since_first,
        }
    }
}

//=========================================================================================
// Subscriptions
//=========================================================================================

/// Subscription status as mirrored from the payment provider.
///
/// Any provider status outside the known set reads back as `Unrecognized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    Active,
    Trialing,
    PastDue,
    Canceled,
    Free,
    #[serde(other)]
    Unrecognized,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 7] = [
        Self::Incomplete,
        Self::Active,
        Self::Trialing,
        Self::PastDue,
        Self::Canceled,
        Self::Free,
        Self::Unrecognized,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "incomplete" => Self::Incomplete,
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "free" => Self::Free,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Free => "free",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub user_id: Uuid,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// A status change received from the payment provider.
///
/// `status` is the provider's string, stored verbatim. `None` in the other
/// fields leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub subscription_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

/// The provider's view of a subscription, fetched when an invoice event
/// only names the subscription id.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub user_id: Uuid,
    pub success_url: String,
    pub cancel_url: String,
}

//=========================================================================================
// AI availability
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AiStatus {
    Available,
    Invalid,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AiStatusReport {
    pub status: AiStatus,
    pub message: String,
}

impl AiStatusReport {
    pub fn new(status: AiStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

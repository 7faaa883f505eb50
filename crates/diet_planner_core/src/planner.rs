//! crates/diet_planner_core/src/planner.rs
//!
//! Plan generation: an optional language-model call with the deterministic
//! estimator as a total fallback. Nothing from the AI path reaches the caller
//! as an error.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{MealPlan, UserProfile};
use crate::estimator;
use crate::ports::PlanGenerationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Ai,
    Estimator,
}

impl PlanSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Estimator => "estimator",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub plan: MealPlan,
    pub source: PlanSource,
}

pub async fn generate_plan(
    ai: Option<&dyn PlanGenerationService>,
    profile: &UserProfile,
) -> GeneratedPlan {
    let Some(ai) = ai else {
        return fallback(profile);
    };

    match ai.generate_plan(profile).await {
        Ok(plan) if !plan.meals.is_empty() => {
            info!(total_calories = plan.total_calories, "AI plan accepted");
            GeneratedPlan {
                plan,
                source: PlanSource::Ai,
            }
        }
        Ok(_) => {
            warn!("AI plan had no meals, using estimator");
            fallback(profile)
        }
        Err(e) => {
            warn!("AI plan generation failed, using estimator: {}", e);
            fallback(profile)
        }
    }
}

fn fallback(profile: &UserProfile) -> GeneratedPlan {
    GeneratedPlan {
        plan: estimator::estimate(profile),
        source: PlanSource::Estimator,
    }
}

//! services/api/src/adapters/diet_llm.rs
//!
//! This module contains the adapter for the plan-generating LLM (xAI Grok,
//! reached through its OpenAI-compatible chat completions endpoint).
//! It implements the `PlanGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use diet_planner_core::{
    domain::{AiStatus, AiStatusReport, Meal, MealPlan, UserProfile},
    estimator,
    ports::{PlanGenerationService, PortError, PortResult},
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const SYSTEM_INSTRUCTIONS: &str = "Você é um nutricionista. Crie um plano alimentar de um dia em português do Brasil. \
Responda APENAS com um objeto JSON, sem texto adicional, no formato: \
{\"totalCalories\": number, \"protein\": number, \"carbs\": number, \"fat\": number, \
\"meals\": [{\"name\": string, \"time\": \"HH:MM\", \"calories\": number, \"foods\": [string]}]}";

/// Upper bound on one plan request. Past this the caller falls back to the estimator.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PlanGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct GrokPlanAdapter {
    client: Client<OpenAIConfig>,
    api_key: String,
    model: String,
}

impl GrokPlanAdapter {
    /// Creates a new `GrokPlanAdapter` pointed at `api_base`.
    ///
    /// The client never retries: a 5xx or 429 from the provider is returned
    /// at once so the estimator can answer instead.
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(api_base);
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_retry),
            api_key,
            model,
        }
    }
}

/// Renders the questionnaire as the natural-language request sent to the model.
pub fn build_prompt(profile: &UserProfile) -> String {
    let restrictions = if profile.restrictions.trim().is_empty() {
        "nenhuma"
    } else {
        profile.restrictions.trim()
    };

    format!(
        "Idade: {} anos\nPeso: {} kg\nAltura: {} cm\nObjetivo: {:?}\nNível de atividade: {:?}\n\
         Refeições por dia: {}\nRestrições alimentares: {}",
        profile.age,
        profile.weight,
        profile.height,
        profile.goal,
        profile.activity_level,
        profile.meals_per_day,
        restrictions
    )
}

//=========================================================================================
// Response parsing
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanPayload {
    total_calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    meals: Option<Vec<MealPayload>>,
}

#[derive(Deserialize)]
struct MealPayload {
    name: String,
    #[serde(default)]
    time: String,
    calories: Option<f64>,
    #[serde(default)]
    foods: Vec<String>,
}

fn whole(value: f64) -> u32 {
    if value.is_finite() {
        value.max(0.0).round() as u32
    } else {
        0
    }
}

/// Extracts the plan from the model's reply. Models often wrap the JSON in
/// prose or code fences, so only the outermost object is parsed.
pub fn parse_plan(content: &str, profile: &UserProfile) -> PortResult<MealPlan> {
    let json = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(PortError::InvalidResponse(
                "Reply did not contain a JSON object".to_string(),
            ))
        }
    };

    let payload: PlanPayload =
        serde_json::from_str(json).map_err(|e| PortError::InvalidResponse(e.to_string()))?;

    let total_calories = payload
        .total_calories
        .filter(|kcal| kcal.is_finite() && *kcal > 0.0)
        .ok_or_else(|| PortError::InvalidResponse("Missing totalCalories".to_string()))?;
    let meals = payload
        .meals
        .ok_or_else(|| PortError::InvalidResponse("Missing meals".to_string()))?;

    // The model may skip the macros; fill them the same way the estimator does.
    let fallback = estimator::macros(profile.weight);

    Ok(MealPlan {
        total_calories: whole(total_calories),
        protein: payload.protein.map(whole).unwrap_or(fallback.protein),
        carbs: payload.carbs.map(whole).unwrap_or(fallback.carbs),
        fat: payload.fat.map(whole).unwrap_or(fallback.fat),
        meals: meals
            .into_iter()
            .map(|meal| Meal {
                name: meal.name,
                time: meal.time,
                calories: meal.calories.map(whole).unwrap_or(0),
                foods: meal.foods,
                prep_steps: None,
            })
            .collect(),
    })
}

/// Rejects keys that cannot possibly work before spending a request on them.
pub fn precheck_key(api_key: &str) -> Option<AiStatusReport> {
    if api_key == "NOT_SET" || api_key.len() < 10 {
        return Some(AiStatusReport::new(
            AiStatus::Unavailable,
            "API key not configured",
        ));
    }
    if api_key.len() < 20 {
        return Some(AiStatusReport::new(
            AiStatus::Invalid,
            "Invalid API key format",
        ));
    }
    None
}

//=========================================================================================
// `PlanGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlanGenerationService for GrokPlanAdapter {
    async fn generate_plan(&self, profile: &UserProfile) -> PortResult<MealPlan> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(profile))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .max_tokens(2000u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = timeout(GENERATION_TIMEOUT, self.client.chat().create(request))
            .await
            .map_err(|_| PortError::Unexpected("Plan LLM request timed out".to_string()))?
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::InvalidResponse("Plan LLM returned no text content.".to_string())
            })?;

        parse_plan(&content, profile)
    }

    async fn check_status(&self) -> AiStatusReport {
        if let Some(report) = precheck_key(&self.api_key) {
            return report;
        }

        let probe = async {
            let messages: Vec<ChatCompletionRequestMessage> =
                vec![ChatCompletionRequestUserMessageArgs::default()
                    .content("Test")
                    .build()?
                    .into()];
            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model)
                .messages(messages)
                .max_tokens(10u32)
                .build()?;
            self.client.chat().create(request).await
        };

        match timeout(PROBE_TIMEOUT, probe).await {
            Err(_) => {
                error!("AI status probe timed out");
                AiStatusReport::new(AiStatus::Unavailable, "Request timed out")
            }
            Ok(Ok(_)) => {
                info!("AI status probe succeeded");
                AiStatusReport::new(AiStatus::Available, "Grok API is working")
            }
            Ok(Err(OpenAIError::ApiError(e))) => {
                error!("AI status probe rejected: {}", e);
                AiStatusReport::new(AiStatus::Invalid, "API key authentication failed")
            }
            Ok(Err(e)) => {
                error!("AI status probe failed: {}", e);
                AiStatusReport::new(AiStatus::Unavailable, "Network error")
            }
        }
    }
}

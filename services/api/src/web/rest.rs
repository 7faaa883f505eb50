//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the plan, profile and entitlement endpoints
//! and the master definition for the OpenAPI specification.

use crate::adapters::analytics::{AnalyticsEvent, EventKind};
use crate::web::billing::{
    self, CheckoutSessionPayload, CheckoutSessionResponse, WebhookAck,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use diet_planner_core::{
    domain::{
        AiStatus, AiStatusReport, DietHistory, DietRecord, Meal, MealPlan, ProfileInput,
        SubscriptionStatus, UserProfile,
    },
    entitlement::{self, DayAccess, EntitlementView, PLAN_DAYS},
    estimator, planner,
    ports::{PortError, PortResult},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const PLAN_SOURCE_HEADER: &str = "x-plan-source";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_diet_handler,
        quick_start_handler,
        ai_status_handler,
        get_profile_handler,
        put_profile_handler,
        list_diets_handler,
        latest_diet_handler,
        delete_diet_handler,
        entitlement_handler,
        day_plan_handler,
        page_view_handler,
        recent_events_handler,
        billing::create_checkout_session_handler,
        billing::stripe_webhook_handler,
    ),
    components(
        schemas(
            ProfileInput, UserProfile, MealPlan, Meal, DietRecord, DietHistory,
            AiStatusReport, AiStatus, EntitlementView, DayAccess, SubscriptionStatus,
            DayPlanResponse, LockedDayResponse, PageViewPayload, AnalyticsEvent, EventKind,
            CheckoutSessionPayload, CheckoutSessionResponse, WebhookAck
        )
    ),
    tags(
        (name = "Diet Planner API", description = "Meal plan generation, history, entitlement and billing.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One day of the weekly plan.
#[derive(Serialize, ToSchema)]
pub struct DayPlanResponse {
    pub day: u32,
    pub plan: MealPlan,
}

/// Sent with `403` when a day needs a subscription.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockedDayResponse {
    pub error: String,
    pub day: u32,
    pub checkout_path: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PageViewPayload {
    pub path: String,
}

//=========================================================================================
// Request helpers
//=========================================================================================

/// Reads the caller's id, set upstream by the auth layer.
pub fn user_id_from(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn optional_user_id(headers: &HeaderMap) -> Option<Uuid> {
    user_id_from(headers).ok()
}

// An unreadable body is treated like an empty questionnaire.
fn profile_from(body: Result<Json<ProfileInput>, JsonRejection>) -> UserProfile {
    match body {
        Ok(Json(input)) => input.into(),
        Err(rejection) => {
            warn!("Unreadable profile body, using defaults: {}", rejection);
            UserProfile::default()
        }
    }
}

fn internal_error(context: &str, e: PortError) -> (StatusCode, String) {
    error!("{}: {:?}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("{}. Please try again.", context),
    )
}

async fn load_latest_plan(app_state: &AppState, user_id: Uuid) -> PortResult<Option<MealPlan>> {
    if let Some(plan) = app_state.cache.get(user_id).await {
        return Ok(Some(plan));
    }

    let latest = app_state.db.latest_diet(user_id).await?;
    if let Some(record) = &latest {
        app_state.cache.insert(user_id, record.plan.clone()).await;
    }
    Ok(latest.map(|record| record.plan))
}

//=========================================================================================
// Plan generation
//=========================================================================================

/// Generate a one-day meal plan.
///
/// Tries the language model first and falls back to the built-in estimator,
/// so this endpoint always answers with a plan. When `x-user-id` is present
/// the plan is also saved to the user's history.
#[utoipa::path(
    post,
    path = "/api/generate-diet",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "The generated plan", body = MealPlan)
    ),
    params(
        ("x-user-id" = Option<Uuid>, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_diet_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> impl IntoResponse {
    let profile = profile_from(body);
    let generated = planner::generate_plan(app_state.ai(), &profile).await;
    let user_id = optional_user_id(&headers);

    if let Some(user_id) = user_id {
        match app_state.db.save_diet(user_id, &generated.plan).await {
            Ok(record) => info!(%user_id, diet_id = %record.id, "Diet saved"),
            Err(e) => error!(%user_id, "Failed to save diet: {:?}", e),
        }
        app_state.cache.insert(user_id, generated.plan.clone()).await;
    }

    app_state.analytics.track(
        EventKind::DietGenerated,
        user_id,
        generated.source.as_str(),
    );

    (
        [(PLAN_SOURCE_HEADER, generated.source.as_str())],
        Json(generated.plan),
    )
}

/// Preview plan with preparation steps, computed locally.
#[utoipa::path(
    post,
    path = "/api/quick-start",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "A preview plan with prepSteps on every meal", body = MealPlan)
    )
)]
pub async fn quick_start_handler(
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> Json<MealPlan> {
    Json(estimator::quick_start(&profile_from(body)))
}

/// Report whether the AI provider is usable.
#[utoipa::path(
    get,
    path = "/api/ai-status",
    responses(
        (status = 200, description = "Provider availability", body = AiStatusReport)
    )
)]
pub async fn ai_status_handler(State(app_state): State<Arc<AppState>>) -> Json<AiStatusReport> {
    let report = match app_state.ai() {
        Some(ai) => ai.check_status().await,
        None => AiStatusReport::new(AiStatus::Unavailable, "API key not configured"),
    };
    Json(report)
}

//=========================================================================================
// Profile
//=========================================================================================

/// Fetch the saved onboarding profile.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "The saved profile", body = UserProfile),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 404, description = "No profile saved yet"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;

    match app_state.db.get_profile(user_id).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Profile not found".to_string())),
        Err(e) => Err(internal_error("Failed to load profile", e)),
    }
}

/// Save the onboarding profile. Values are coerced exactly like plan requests.
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "The stored profile", body = UserProfile),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn put_profile_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;
    let profile = profile_from(body);

    app_state
        .db
        .upsert_profile(user_id, &profile)
        .await
        .map_err(|e| internal_error("Failed to save profile", e))?;

    Ok(Json(profile))
}

//=========================================================================================
// Diet history
//=========================================================================================

/// List the user's saved plans, newest first.
#[utoipa::path(
    get,
    path = "/api/diets",
    responses(
        (status = 200, description = "Saved plans and summary figures", body = DietHistory),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 500, description = "History could not be loaded")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_diets_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DietHistory>, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;

    let records = app_state
        .db
        .list_diets(user_id)
        .await
        .map_err(|e| internal_error("Failed to load diet history", e))?;

    Ok(Json(DietHistory::from_records(records, Utc::now())))
}

/// The user's most recent plan.
#[utoipa::path(
    get,
    path = "/api/diets/latest",
    responses(
        (status = 200, description = "The latest plan", body = MealPlan),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 404, description = "No plan generated yet"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn latest_diet_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MealPlan>, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;

    match load_latest_plan(&app_state, user_id).await {
        Ok(Some(plan)) => Ok(Json(plan)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No diet found".to_string())),
        Err(e) => Err(internal_error("Failed to load latest diet", e)),
    }
}

/// Delete one of the user's saved plans.
#[utoipa::path(
    delete,
    path = "/api/diets/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 404, description = "No such plan for this user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The plan id."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_diet_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(diet_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;

    match app_state.db.delete_diet(user_id, diet_id).await {
        Ok(()) => {
            app_state.cache.invalidate(user_id).await;
            info!(%user_id, %diet_id, "Diet deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(PortError::NotFound(_)) => Err((StatusCode::NOT_FOUND, "Diet not found".to_string())),
        Err(e) => Err(internal_error("Failed to delete diet", e)),
    }
}

//=========================================================================================
// Entitlement
//=========================================================================================

/// Which days of the weekly plan the user may open.
///
/// If the subscription cannot be read, every day past the first is reported
/// as locked.
#[utoipa::path(
    get,
    path = "/api/entitlement",
    responses(
        (status = 200, description = "Per-day lock state", body = EntitlementView),
        (status = 400, description = "Missing or invalid x-user-id")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn entitlement_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<EntitlementView>, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;
    let status = entitlement::resolve_status(app_state.db.get_subscription(user_id).await);
    Ok(Json(EntitlementView::new(status)))
}

/// One day of the latest plan, enforced on the server.
#[utoipa::path(
    get,
    path = "/api/diets/latest/days/{day}",
    responses(
        (status = 200, description = "The plan for this day", body = DayPlanResponse),
        (status = 400, description = "Missing or invalid x-user-id"),
        (status = 403, description = "Day needs a subscription", body = LockedDayResponse),
        (status = 404, description = "Day out of range or no plan yet"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("day" = u32, Path, description = "Day of the week, 1 to 7."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn day_plan_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(day): Path<u32>,
) -> Result<Response, (StatusCode, String)> {
    let user_id = user_id_from(&headers)?;
    if !(1..=PLAN_DAYS).contains(&day) {
        return Err((StatusCode::NOT_FOUND, format!("Day {} does not exist", day)));
    }

    let status = entitlement::resolve_status(app_state.db.get_subscription(user_id).await);
    if entitlement::is_day_locked(day, status) {
        info!(%user_id, day, "Locked day requested");
        let body = LockedDayResponse {
            error: "Desbloqueie o Plano Completo".to_string(),
            day,
            checkout_path: "/api/create-checkout-session".to_string(),
        };
        return Ok((StatusCode::FORBIDDEN, Json(body)).into_response());
    }

    match load_latest_plan(&app_state, user_id).await {
        Ok(Some(plan)) => Ok(Json(DayPlanResponse { day, plan }).into_response()),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No diet found".to_string())),
        Err(e) => Err(internal_error("Failed to load latest diet", e)),
    }
}

//=========================================================================================
// Analytics
//=========================================================================================

/// Record a page view.
#[utoipa::path(
    post,
    path = "/api/analytics/page-view",
    request_body = PageViewPayload,
    responses(
        (status = 202, description = "Recorded")
    ),
    params(
        ("x-user-id" = Option<Uuid>, Header, description = "The unique ID of the user.")
    )
)]
pub async fn page_view_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PageViewPayload>,
) -> StatusCode {
    app_state
        .analytics
        .track(EventKind::PageView, optional_user_id(&headers), payload.path);
    StatusCode::ACCEPTED
}

/// The most recent analytics events held in memory, oldest first.
#[utoipa::path(
    get,
    path = "/api/analytics/events",
    responses(
        (status = 200, description = "Buffered events", body = [AnalyticsEvent])
    )
)]
pub async fn recent_events_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<Vec<AnalyticsEvent>> {
    Json(app_state.analytics.recent())
}

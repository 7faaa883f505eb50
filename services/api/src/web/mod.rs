pub mod billing;
pub mod rest;
pub mod state;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the full application router: API routes, Swagger UI and request tracing.
pub fn router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/generate-diet", post(rest::generate_diet_handler))
        .route("/api/quick-start", post(rest::quick_start_handler))
        .route("/api/ai-status", get(rest::ai_status_handler))
        .route(
            "/api/profile",
            get(rest::get_profile_handler).put(rest::put_profile_handler),
        )
        .route("/api/diets", get(rest::list_diets_handler))
        .route("/api/diets/latest", get(rest::latest_diet_handler))
        .route("/api/diets/latest/days/{day}", get(rest::day_plan_handler))
        .route("/api/diets/{id}", delete(rest::delete_diet_handler))
        .route("/api/entitlement", get(rest::entitlement_handler))
        .route("/api/analytics/page-view", post(rest::page_view_handler))
        .route("/api/analytics/events", get(rest::recent_events_handler))
        .route(
            "/api/create-checkout-session",
            post(billing::create_checkout_session_handler),
        )
        .route("/api/stripe-webhook", post(billing::stripe_webhook_handler))
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Analytics, DbAdapter, GrokPlanAdapter, PlanCache, StripeAdapter},
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use diet_planner_core::ports::PlanGenerationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let ai: Option<Arc<dyn PlanGenerationService>> = match &config.grok_api_key {
        Some(key) => Some(Arc::new(GrokPlanAdapter::new(
            key.clone(),
            config.grok_api_base.clone(),
            config.grok_model.clone(),
        ))),
        None => {
            warn!("GROK_API_KEY not set; plans will come from the estimator only");
            None
        }
    };

    let payments = Arc::new(StripeAdapter::new(
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
        config.stripe_price_id.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        ai,
        payments,
        cache: PlanCache::new(config.plan_cache_ttl, config.plan_cache_capacity),
        analytics: Arc::new(Analytics::new(config.analytics_capacity)),
    });

    // --- 5. Create the Web Router ---
    let allowed_origin = config
        .public_app_url
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid PUBLIC_APP_URL: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-user-id")]);

    let app = web::router(app_state).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

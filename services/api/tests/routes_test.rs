//! HTTP-level tests driving the full router against in-memory ports.

use api_lib::{
    adapters::{stripe::parse_event, Analytics, PlanCache},
    config::Config,
    web::{router, AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use diet_planner_core::{
    billing::BillingEvent,
    domain::{
        AiStatus, AiStatusReport, CheckoutRequest, DietRecord, Meal, MealPlan,
        ProviderSubscription, SubscriptionRecord, SubscriptionStatus, SubscriptionUpdate,
        UserProfile,
    },
    ports::{DatabaseService, PaymentService, PlanGenerationService, PortError, PortResult},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// In-memory ports
//=========================================================================================

#[derive(Default)]
struct MemoryDb {
    profiles: Mutex<HashMap<Uuid, UserProfile>>,
    diets: Mutex<Vec<DietRecord>>,
    subscriptions: Mutex<Vec<SubscriptionRecord>>,
    broken: bool,
}

impl MemoryDb {
    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn check(&self) -> PortResult<()> {
        if self.broken {
            Err(PortError::Unexpected("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn with_subscription(self, user_id: Uuid, status: SubscriptionStatus) -> Self {
        self.subscriptions.lock().unwrap().push(SubscriptionRecord {
            user_id,
            customer_id: format!("cus_{}", user_id.simple()),
            subscription_id: None,
            status,
            current_period_end: None,
        });
        self
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn upsert_profile(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()> {
        self.check()?;
        self.profiles.lock().unwrap().insert(user_id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
        self.check()?;
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn save_diet(&self, user_id: Uuid, plan: &MealPlan) -> PortResult<DietRecord> {
        self.check()?;
        let record = DietRecord {
            id: Uuid::new_v4(),
            user_id,
            plan: plan.clone(),
            created_at: Utc::now(),
        };
        self.diets.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn latest_diet(&self, user_id: Uuid) -> PortResult<Option<DietRecord>> {
        self.check()?;
        let diets = self.diets.lock().unwrap();
        Ok(diets
            .iter()
            .filter(|d| d.user_id == user_id)
            .max_by_key(|d| d.created_at)
            .cloned())
    }

    async fn list_diets(&self, user_id: Uuid) -> PortResult<Vec<DietRecord>> {
        self.check()?;
        let diets = self.diets.lock().unwrap();
        Ok(diets.iter().filter(|d| d.user_id == user_id).cloned().collect())
    }

    async fn delete_diet(&self, user_id: Uuid, diet_id: Uuid) -> PortResult<()> {
        self.check()?;
        let mut diets = self.diets.lock().unwrap();
        let before = diets.len();
        diets.retain(|d| !(d.id == diet_id && d.user_id == user_id));
        if diets.len() == before {
            return Err(PortError::NotFound(diet_id.to_string()));
        }
        Ok(())
    }

    async fn get_subscription(&self, user_id: Uuid) -> PortResult<Option<SubscriptionRecord>> {
        self.check()?;
        let subscriptions = self.subscriptions.lock().unwrap();
        Ok(subscriptions.iter().find(|s| s.user_id == user_id).cloned())
    }

    async fn create_pending_subscription(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> PortResult<SubscriptionRecord> {
        self.check()?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if let Some(existing) = subscriptions.iter().find(|r| r.user_id == user_id) {
            return Ok(existing.clone());
        }
        let record = SubscriptionRecord {
            user_id,
            customer_id: customer_id.to_string(),
            subscription_id: None,
            status: SubscriptionStatus::Incomplete,
            current_period_end: None,
        };
        subscriptions.push(record.clone());
        Ok(record)
    }

    async fn update_subscription_by_customer(
        &self,
        customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> PortResult<bool> {
        self.check()?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let Some(record) = subscriptions
            .iter_mut()
            .find(|s| s.customer_id == customer_id)
        else {
            return Ok(false);
        };
        record.status = SubscriptionStatus::parse(&update.status);
        if let Some(id) = &update.subscription_id {
            record.subscription_id = Some(id.clone());
        }
        if let Some(end) = update.current_period_end {
            record.current_period_end = Some(end);
        }
        Ok(true)
    }
}

struct CannedAi(Option<MealPlan>);

#[async_trait]
impl PlanGenerationService for CannedAi {
    async fn generate_plan(&self, _profile: &UserProfile) -> PortResult<MealPlan> {
        self.0
            .clone()
            .ok_or_else(|| PortError::InvalidResponse("no JSON in reply".into()))
    }

    async fn check_status(&self) -> AiStatusReport {
        AiStatusReport::new(AiStatus::Available, "Grok API is working")
    }
}

#[derive(Default)]
struct FakePayments {
    failing: bool,
}

#[async_trait]
impl PaymentService for FakePayments {
    async fn create_customer(&self, _email: &str, _user_id: Uuid) -> PortResult<String> {
        if self.failing {
            return Err(PortError::Unexpected("Stripe returned 500".into()));
        }
        Ok("cus_new".into())
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> PortResult<String> {
        Ok(format!(
            "https://checkout.example/{}?success={}",
            request.customer_id, request.success_url
        ))
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> PortResult<ProviderSubscription> {
        Ok(ProviderSubscription {
            id: subscription_id.to_string(),
            customer_id: "cus_new".into(),
            status: "active".into(),
            current_period_end: None,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<BillingEvent> {
        if signature != "t=1,v1=good" {
            return Err(PortError::Unauthorized);
        }
        parse_event(payload)
    }
}

//=========================================================================================
// Harness
//=========================================================================================

fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("DATABASE_URL", "postgres://localhost/test"),
        ("STRIPE_SECRET_KEY", "sk_test"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_test"),
        ("STRIPE_PRICE_ID", "price_test"),
        ("PUBLIC_APP_URL", "https://app.example"),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

struct Harness {
    app: Router,
    db: Arc<MemoryDb>,
    analytics: Arc<Analytics>,
}

fn harness_with(
    db: MemoryDb,
    ai: Option<Arc<dyn PlanGenerationService>>,
    payments: FakePayments,
) -> Harness {
    let db = Arc::new(db);
    let analytics = Arc::new(Analytics::new(10));
    let state = Arc::new(AppState {
        db: db.clone(),
        config: Arc::new(test_config()),
        ai,
        payments: Arc::new(payments),
        cache: PlanCache::new(Duration::from_secs(60), 100),
        analytics: analytics.clone(),
    });
    Harness {
        app: router(state),
        db,
        analytics,
    }
}

fn harness(db: MemoryDb) -> Harness {
    harness_with(db, None, FakePayments::default())
}

fn request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ai_plan() -> MealPlan {
    MealPlan {
        total_calories: 1900,
        protein: 100,
        carbs: 200,
        fat: 60,
        meals: vec![Meal {
            name: "Almoço".into(),
            time: "12:30".into(),
            calories: 700,
            foods: vec!["Salada".into()],
            prep_steps: None,
        }],
    }
}

//=========================================================================================
// Plan generation
//=========================================================================================

#[tokio::test]
async fn generate_diet_falls_back_to_the_estimator_and_saves() {
    let h = harness(MemoryDb::default());
    let user = Uuid::new_v4();

    let response = send(
        &h.app,
        request("POST", "/api/generate-diet", Some(user), Some(json!({}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-plan-source"], "estimator");

    let plan = json_body(response).await;
    assert_eq!(plan["totalCalories"], 2163);
    assert_eq!(plan["protein"], 104);
    assert_eq!(plan["meals"].as_array().unwrap().len(), 5);

    assert_eq!(h.db.diets.lock().unwrap().len(), 1);
    assert_eq!(h.analytics.recent()[0].detail, "estimator");

    let latest = send(&h.app, request("GET", "/api/diets/latest", Some(user), None)).await;
    assert_eq!(latest.status(), StatusCode::OK);
    assert_eq!(json_body(latest).await["totalCalories"], 2163);
}

#[tokio::test]
async fn generate_diet_uses_the_ai_plan_when_it_has_meals() {
    let ai: Arc<dyn PlanGenerationService> = Arc::new(CannedAi(Some(ai_plan())));
    let h = harness_with(MemoryDb::default(), Some(ai), FakePayments::default());

    let response = send(
        &h.app,
        request("POST", "/api/generate-diet", None, Some(json!({"weight": 70}))),
    )
    .await;
    assert_eq!(response.headers()["x-plan-source"], "ai");
    assert_eq!(json_body(response).await["totalCalories"], 1900);
    assert!(h.db.diets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generate_diet_survives_ai_and_storage_failures() {
    let ai: Arc<dyn PlanGenerationService> = Arc::new(CannedAi(None));
    let h = harness_with(MemoryDb::broken(), Some(ai), FakePayments::default());

    let response = send(
        &h.app,
        request(
            "POST",
            "/api/generate-diet",
            Some(Uuid::new_v4()),
            Some(json!({"goal": "lose"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["totalCalories"], 1663);
}

#[tokio::test]
async fn unreadable_body_is_treated_as_an_empty_questionnaire() {
    let h = harness(MemoryDb::default());
    let req = Request::builder()
        .method("POST")
        .uri("/api/generate-diet")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&h.app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["totalCalories"], 2163);
}

#[tokio::test]
async fn quick_start_includes_prep_steps() {
    let h = harness(MemoryDb::default());
    let response = send(
        &h.app,
        request("POST", "/api/quick-start", None, Some(json!({"mealsPerDay": 3}))),
    )
    .await;
    let plan = json_body(response).await;
    let meals = plan["meals"].as_array().unwrap();
    assert_eq!(meals.len(), 3);
    assert!(meals.iter().all(|m| m["prepSteps"].is_array()));
}

#[tokio::test]
async fn ai_status_without_a_key_is_unavailable() {
    let h = harness(MemoryDb::default());
    let body = json_body(send(&h.app, request("GET", "/api/ai-status", None, None)).await).await;
    assert_eq!(body["status"], "unavailable");
}

//=========================================================================================
// Profile and history
//=========================================================================================

#[tokio::test]
async fn profile_is_coerced_and_stored() {
    let h = harness(MemoryDb::default());
    let user = Uuid::new_v4();

    let missing = send(&h.app, request("GET", "/api/profile", Some(user), None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let saved = send(
        &h.app,
        request(
            "PUT",
            "/api/profile",
            Some(user),
            Some(json!({"age": "31", "mealsPerDay": 12, "restrictions": ["lactose"]})),
        ),
    )
    .await;
    assert_eq!(saved.status(), StatusCode::OK);

    let body = json_body(send(&h.app, request("GET", "/api/profile", Some(user), None)).await).await;
    assert_eq!(body["age"], 31.0);
    assert_eq!(body["mealsPerDay"], 6);
    assert_eq!(body["restrictions"], "lactose");
}

#[tokio::test]
async fn user_scoped_routes_require_the_user_header() {
    let h = harness(MemoryDb::default());
    for uri in ["/api/diets", "/api/entitlement", "/api/profile"] {
        let response = send(&h.app, request("GET", uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn history_failure_is_a_500() {
    let h = harness(MemoryDb::broken());
    let response = send(&h.app, request("GET", "/api/diets", Some(Uuid::new_v4()), None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn deleting_plans_is_scoped_to_the_owner() {
    let h = harness(MemoryDb::default());
    let owner = Uuid::new_v4();
    send(
        &h.app,
        request("POST", "/api/generate-diet", Some(owner), Some(json!({}))),
    )
    .await;
    let diet_id = h.db.diets.lock().unwrap()[0].id;
    let uri = format!("/api/diets/{}", diet_id);

    let stranger = send(&h.app, request("DELETE", &uri, Some(Uuid::new_v4()), None)).await;
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);

    let owned = send(&h.app, request("DELETE", &uri, Some(owner), None)).await;
    assert_eq!(owned.status(), StatusCode::NO_CONTENT);

    let history = json_body(send(&h.app, request("GET", "/api/diets", Some(owner), None)).await).await;
    assert_eq!(history["diets"].as_array().unwrap().len(), 0);

    let latest = send(&h.app, request("GET", "/api/diets/latest", Some(owner), None)).await;
    assert_eq!(latest.status(), StatusCode::NOT_FOUND);
}

//=========================================================================================
// Entitlement
//=========================================================================================

#[tokio::test]
async fn free_users_only_see_day_one() {
    let h = harness(MemoryDb::default());
    let body = json_body(
        send(&h.app, request("GET", "/api/entitlement", Some(Uuid::new_v4()), None)).await,
    )
    .await;
    assert_eq!(body["status"], "free");
    assert_eq!(body["entitled"], false);
    let locked: Vec<bool> = body["days"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["locked"].as_bool().unwrap())
        .collect();
    assert_eq!(locked, vec![false, true, true, true, true, true, true]);
}

#[tokio::test]
async fn trialing_users_see_every_day() {
    let user = Uuid::new_v4();
    let h = harness(MemoryDb::default().with_subscription(user, SubscriptionStatus::Trialing));
    let body = json_body(send(&h.app, request("GET", "/api/entitlement", Some(user), None)).await).await;
    assert_eq!(body["entitled"], true);
    assert!(body["days"]
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["locked"] == false));
}

#[tokio::test]
async fn entitlement_fails_closed_when_the_store_is_down() {
    let h = harness(MemoryDb::broken());
    let body = json_body(
        send(&h.app, request("GET", "/api/entitlement", Some(Uuid::new_v4()), None)).await,
    )
    .await;
    assert!(body["status"].is_null());
    assert_eq!(body["entitled"], false);
    assert_eq!(body["days"][1]["locked"], true);
}

#[tokio::test]
async fn day_endpoint_enforces_the_gate() {
    let h = harness(MemoryDb::default());
    let user = Uuid::new_v4();
    send(
        &h.app,
        request("POST", "/api/generate-diet", Some(user), Some(json!({}))),
    )
    .await;

    let day_one = send(
        &h.app,
        request("GET", "/api/diets/latest/days/1", Some(user), None),
    )
    .await;
    assert_eq!(day_one.status(), StatusCode::OK);
    assert_eq!(json_body(day_one).await["day"], 1);

    let day_two = send(
        &h.app,
        request("GET", "/api/diets/latest/days/2", Some(user), None),
    )
    .await;
    assert_eq!(day_two.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(day_two).await["checkoutPath"],
        "/api/create-checkout-session"
    );

    for day in ["0", "8"] {
        let out_of_range = send(
            &h.app,
            request("GET", &format!("/api/diets/latest/days/{}", day), Some(user), None),
        )
        .await;
        assert_eq!(out_of_range.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn active_subscribers_can_open_day_seven() {
    let user = Uuid::new_v4();
    let h = harness(MemoryDb::default().with_subscription(user, SubscriptionStatus::Active));
    send(
        &h.app,
        request("POST", "/api/generate-diet", Some(user), Some(json!({}))),
    )
    .await;

    let response = send(
        &h.app,
        request("GET", "/api/diets/latest/days/7", Some(user), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

//=========================================================================================
// Billing
//=========================================================================================

#[tokio::test]
async fn checkout_requires_user_and_email() {
    let h = harness(MemoryDb::default());
    let response = send(
        &h.app,
        request(
            "POST",
            "/api/create-checkout-session",
            None,
            Some(json!({"user_id": Uuid::new_v4().to_string()})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_returns_the_redirect_url() {
    let h = harness(MemoryDb::default());
    let user = Uuid::new_v4();
    let response = send(
        &h.app,
        request(
            "POST",
            "/api/create-checkout-session",
            None,
            Some(json!({"user_id": user.to_string(), "email": "ana@example.com"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = json_body(response).await["url"].as_str().unwrap().to_string();
    assert!(url.contains("cus_new"));
    assert!(url.contains("https://app.example/success"));

    let record = h.db.get_subscription(user).await.unwrap().unwrap();
    assert_eq!(record.status, SubscriptionStatus::Incomplete);
}

#[tokio::test]
async fn checkout_failure_is_a_generic_500() {
    let h = harness_with(
        MemoryDb::default(),
        None,
        FakePayments { failing: true },
    );
    let response = send(
        &h.app,
        request(
            "POST",
            "/api/create-checkout-session",
            None,
            Some(json!({"user_id": Uuid::new_v4().to_string(), "email": "ana@example.com"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

fn webhook(signature: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/stripe-webhook");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn webhook_rejects_missing_or_bad_signatures() {
    let h = harness(MemoryDb::default());
    let body = json!({"type": "charge.refunded", "data": {"object": {}}});

    let missing = send(&h.app, webhook(None, body.clone())).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let forged = send(&h.app, webhook(Some("t=1,v1=forged"), body)).await;
    assert_eq!(forged.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_mirrors_the_subscription_status() {
    let user = Uuid::new_v4();
    let h = harness(MemoryDb::default());
    h.db.create_pending_subscription(user, "cus_new").await.unwrap();

    let event = json!({
        "type": "customer.subscription.updated",
        "data": {"object": {
            "id": "sub_1",
            "customer": "cus_new",
            "status": "active",
            "current_period_end": 1_790_000_000
        }}
    });
    let response = send(&h.app, webhook(Some("t=1,v1=good"), event)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);

    let entitlement =
        json_body(send(&h.app, request("GET", "/api/entitlement", Some(user), None)).await).await;
    assert_eq!(entitlement["status"], "active");
    assert_eq!(entitlement["entitled"], true);
}

#[tokio::test]
async fn webhook_store_failure_is_a_500() {
    let h = harness(MemoryDb::broken());
    let event = json!({
        "type": "customer.subscription.deleted",
        "data": {"object": {"id": "sub_1", "customer": "cus_new", "status": "canceled"}}
    });
    let response = send(&h.app, webhook(Some("t=1,v1=good"), event)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn page_views_are_buffered() {
    let h = harness(MemoryDb::default());
    let response = send(
        &h.app,
        request("POST", "/api/analytics/page-view", None, Some(json!({"path": "/pricing"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let events = json_body(send(&h.app, request("GET", "/api/analytics/events", None, None)).await).await;
    assert_eq!(events[0]["kind"], "page_view");
    assert_eq!(events[0]["detail"], "/pricing");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let h = harness(MemoryDb::default());
    let response = send(&h.app, request("GET", "/api-docs/openapi.json", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/api/generate-diet"].is_object());
}

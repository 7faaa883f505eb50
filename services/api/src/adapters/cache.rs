//! services/api/src/adapters/cache.rs
//!
//! Short-lived cache of each user's most recent plan, so the dashboard does
//! not hit the database on every load.

use diet_planner_core::domain::MealPlan;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct PlanCache {
    inner: Cache<Uuid, MealPlan>,
}

impl PlanCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<MealPlan> {
        let hit = self.inner.get(&user_id).await;
        debug!(%user_id, hit = hit.is_some(), "Plan cache lookup");
        hit
    }

    pub async fn insert(&self, user_id: Uuid, plan: MealPlan) {
        self.inner.insert(user_id, plan).await;
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.inner.invalidate(&user_id).await;
    }
}

//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diet_planner_core::domain::{
    DietRecord, MealPlan, SubscriptionRecord, SubscriptionStatus, SubscriptionUpdate, UserProfile,
};
use diet_planner_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    profile: Json<UserProfile>,
}

#[derive(FromRow)]
struct DietRow {
    id: Uuid,
    user_id: Uuid,
    plan: Json<MealPlan>,
    created_at: DateTime<Utc>,
}
impl DietRow {
    fn to_domain(self) -> DietRecord {
        DietRecord {
            id: self.id,
            user_id: self.user_id,
            plan: self.plan.0,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    customer_id: String,
    subscription_id: Option<String>,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
}
impl SubscriptionRow {
    fn to_domain(self) -> SubscriptionRecord {
        SubscriptionRecord {
            user_id: self.user_id,
            customer_id: self.customer_id,
            subscription_id: self.subscription_id,
            status: SubscriptionStatus::parse(&self.status),
            current_period_end: self.current_period_end,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn upsert_profile(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, profile) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET profile = EXCLUDED.profile, updated_at = now()",
        )
        .bind(user_id)
        .bind(Json(profile))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT profile FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.profile.0))
    }

    async fn save_diet(&self, user_id: Uuid, plan: &MealPlan) -> PortResult<DietRecord> {
        let record = sqlx::query_as::<_, DietRow>(
            "INSERT INTO diets (id, user_id, plan) VALUES ($1, $2, $3) \
             RETURNING id, user_id, plan, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Json(plan))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn latest_diet(&self, user_id: Uuid) -> PortResult<Option<DietRecord>> {
        let record = sqlx::query_as::<_, DietRow>(
            "SELECT id, user_id, plan, created_at FROM diets WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(DietRow::to_domain))
    }

    async fn list_diets(&self, user_id: Uuid) -> PortResult<Vec<DietRecord>> {
        let records = sqlx::query_as::<_, DietRow>(
            "SELECT id, user_id, plan, created_at FROM diets WHERE user_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(DietRow::to_domain).collect())
    }

    async fn delete_diet(&self, user_id: Uuid, diet_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM diets WHERE id = $1 AND user_id = $2")
            .bind(diet_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Diet {} not found", diet_id)));
        }
        Ok(())
    }

    async fn get_subscription(&self, user_id: Uuid) -> PortResult<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT user_id, customer_id, subscription_id, status, current_period_end \
             FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(SubscriptionRow::to_domain))
    }

    async fn create_pending_subscription(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> PortResult<SubscriptionRecord> {
        sqlx::query(
            "INSERT INTO subscriptions (user_id, customer_id, status) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(customer_id)
        .bind(SubscriptionStatus::Incomplete.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        // Separate statement so a row committed by a concurrent checkout is visible.
        let record = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT user_id, customer_id, subscription_id, status, current_period_end \
             FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn update_subscription_by_customer(
        &self,
        customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = $2, \
             subscription_id = COALESCE($3, subscription_id), \
             current_period_end = COALESCE($4, current_period_end), \
             updated_at = now() \
             WHERE customer_id = $1",
        )
        .bind(customer_id)
        .bind(&update.status)
        .bind(update.subscription_id.as_deref())
        .bind(update.current_period_end)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected() > 0)
    }
}

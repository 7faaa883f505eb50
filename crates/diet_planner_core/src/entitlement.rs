//! crates/diet_planner_core/src/entitlement.rs
//!
//! The entitlement gate. Day 1 of a plan is always visible; the remaining
//! days need an `active` or `trialing` subscription. The same predicate backs
//! the entitlement view sent to clients and the server-side day endpoint.

use serde::Serialize;
use tracing::warn;

use crate::domain::{SubscriptionRecord, SubscriptionStatus};
use crate::ports::PortResult;

/// Number of days in a plan.
pub const PLAN_DAYS: u32 = 7;

/// Days visible without a subscription.
pub const FREE_DAYS: u32 = 1;

/// `None` means the status could not be determined, which never grants access.
pub fn is_entitled(status: Option<SubscriptionStatus>) -> bool {
    matches!(
        status,
        Some(SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    )
}

pub fn is_day_locked(day: u32, status: Option<SubscriptionStatus>) -> bool {
    day > FREE_DAYS && !is_entitled(status)
}

/// Turns a subscription lookup into the gate's input.
///
/// A user without a record is on the free tier. A failed lookup yields
/// `None` so the gate stays closed.
pub fn resolve_status(
    lookup: PortResult<Option<SubscriptionRecord>>,
) -> Option<SubscriptionStatus> {
    match lookup {
        Ok(Some(record)) => Some(record.status),
        Ok(None) => Some(SubscriptionStatus::Free),
        Err(e) => {
            warn!("Subscription lookup failed, treating user as unentitled: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DayAccess {
    pub day: u32,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntitlementView {
    /// `null` when the subscription record was unavailable.
    pub status: Option<SubscriptionStatus>,
    pub entitled: bool,
    pub days: Vec<DayAccess>,
}

impl EntitlementView {
    pub fn new(status: Option<SubscriptionStatus>) -> Self {
        let days = (1..=PLAN_DAYS)
            .map(|day| DayAccess {
                day,
                locked: is_day_locked(day, status),
            })
            .collect();

        Self {
            status,
            entitled: is_entitled(status),
            days,
        }
    }
}

//! services/api/src/adapters/analytics.rs
//!
//! A bounded, in-process product analytics buffer. Every event is also logged
//! through `tracing`; the buffer only keeps the most recent ones.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DietGenerated,
    SubscriptionStarted,
    PageView,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DietGenerated => "diet_generated",
            Self::SubscriptionStarted => "subscription_started",
            Self::PageView => "page_view",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub kind: EventKind,
    pub user_id: Option<Uuid>,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct Analytics {
    capacity: usize,
    events: Mutex<VecDeque<AnalyticsEvent>>,
}

impl Analytics {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records an event, dropping the oldest one once the buffer is full.
    pub fn track(&self, kind: EventKind, user_id: Option<Uuid>, detail: impl Into<String>) {
        let event = AnalyticsEvent {
            kind,
            user_id,
            detail: detail.into(),
            recorded_at: Utc::now(),
        };
        info!(
            event = kind.as_str(),
            user_id = ?event.user_id,
            detail = %event.detail,
            "Analytics event"
        );

        if self.capacity == 0 {
            return;
        }
        // A panic while holding the lock cannot leave the queue half-written.
        let mut events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Most recent events, oldest first.
    pub fn recent(&self) -> Vec<AnalyticsEvent> {
        let events = self.events.lock().unwrap_or_else(|p| p.into_inner());
        events.iter().cloned().collect()
    }
}

//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::{Analytics, PlanCache};
use crate::config::Config;
use diet_planner_core::ports::{DatabaseService, PaymentService, PlanGenerationService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// `None` when no AI key is configured; plans then come from the estimator.
    pub ai: Option<Arc<dyn PlanGenerationService>>,
    pub payments: Arc<dyn PaymentService>,
    pub cache: PlanCache,
    pub analytics: Arc<Analytics>,
}

impl AppState {
    pub fn ai(&self) -> Option<&dyn PlanGenerationService> {
        self.ai.as_deref()
    }
}

pub mod analytics;
pub mod cache;
pub mod db;
pub mod diet_llm;
pub mod stripe;

pub use analytics::Analytics;
pub use cache::PlanCache;
pub use db::DbAdapter;
pub use diet_llm::GrokPlanAdapter;
pub use stripe::StripeAdapter;

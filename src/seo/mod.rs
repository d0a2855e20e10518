//! # SEO promotion pipeline
//!
//! Funnel metrics flow through eligibility, profit signals and action
//! classification into an execution plan, which the applier writes to the city
//! registry and the index queue. Everything up to the plan is read-only.

pub mod actions;
pub mod applier;
pub mod eligibility;
pub mod health;
pub mod planner;
pub mod signals;

pub use actions::{ActionBucket, classify_actions};
pub use applier::{ActionOutcome, ApplyReport, apply_seo_execution_plan};
pub use eligibility::{FunnelCounts, eligible_locations, indexable_slugs, is_eligible};
pub use health::{
    HealthFlags, HealthState, IndexingStats, OpsSnapshot, evaluate_health, health_state,
    indexing_stats, ops_snapshot,
};
pub use planner::{ExecutionPlan, PlanInputs, build_execution_plan, get_seo_execution_plan};
pub use signals::{
    ProfitSignal, ProfitTier, RevenueStat, classify_profit, profit_signals, revenue_stats,
};

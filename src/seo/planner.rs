//! Execution planner: turns promotion actions into a diff plan against the
//! current queue state, gated by the kill switch, the backlog and queue health.

use std::collections::{BTreeMap, HashMap};

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::actions::{ActionBucket, classify_actions};
use super::eligibility::eligible_locations;
use super::health::{HealthState, health_from_stats, indexing_stats};
use super::signals::profit_signals;
use crate::config::AppConfig;
use crate::models::index_queue::QueueStatus;
use crate::repositories::{IndexQueueRepository, SystemConfigRepository};

pub const SEO_DISABLED_REASON: &str = "SEO system disabled";
pub const QUEUE_UNAVAILABLE_REASON: &str = "queue state unavailable";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PromotePlan {
    pub priority_increase: Vec<String>,
    pub reindex: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintainPlan {
    pub monitor: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DemotePlan {
    pub deprioritize: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FreezePlan {
    pub stop_indexing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanMeta {
    pub health_blocked: bool,
    pub reason: Option<String>,
}

/// Diff plan consumed by the applier. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionPlan {
    pub promote: PromotePlan,
    pub maintain: MaintainPlan,
    pub demote: DemotePlan,
    pub freeze: FreezePlan,
    pub meta: PlanMeta,
}

impl ExecutionPlan {
    fn blocked(reason: &str) -> Self {
        Self {
            meta: PlanMeta {
                health_blocked: true,
                reason: Some(reason.to_string()),
            },
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.promote.priority_increase.is_empty()
            && self.promote.reindex.is_empty()
            && self.maintain.monitor.is_empty()
            && self.demote.deprioritize.is_empty()
            && self.freeze.stop_indexing.is_empty()
    }
}

/// Everything the planner decides over, already loaded.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub seo_enabled: bool,
    pub actions: BTreeMap<String, ActionBucket>,
    /// Statuses of existing queue rows per location key, for promoted keys.
    /// `None` when the queue could not be read.
    pub queue_statuses: Option<HashMap<String, Vec<QueueStatus>>>,
    /// Pending plus retrying rows across the whole queue
    pub backlog: u64,
    pub health: HealthState,
}

/// Builds the plan. Pure: the same inputs always yield the same plan.
pub fn build_execution_plan(inputs: &PlanInputs) -> ExecutionPlan {
    if !inputs.seo_enabled {
        return ExecutionPlan::blocked(SEO_DISABLED_REASON);
    }

    let mut plan = ExecutionPlan::default();
    let mut promoted = Vec::new();

    // BTreeMap iteration keeps every list sorted
    for (key, bucket) in &inputs.actions {
        match bucket {
            ActionBucket::Maintain => plan.maintain.monitor.push(key.clone()),
            ActionBucket::Demote => plan.demote.deprioritize.push(key.clone()),
            ActionBucket::Freeze => plan.freeze.stop_indexing.push(key.clone()),
            ActionBucket::Promote => promoted.push(key.clone()),
        }
    }

    let Some(queue_statuses) = &inputs.queue_statuses else {
        // Without queue state a promotion cannot be split safely
        plan.meta = PlanMeta {
            health_blocked: true,
            reason: Some(QUEUE_UNAVAILABLE_REASON.to_string()),
        };
        return plan;
    };

    for key in promoted {
        let fully_submitted = queue_statuses
            .get(&key)
            .is_some_and(|statuses| {
                !statuses.is_empty() && statuses.iter().all(|s| *s == QueueStatus::Submitted)
            });

        if fully_submitted {
            plan.promote.priority_increase.push(key);
        } else {
            plan.promote.reindex.push(key);
        }
    }

    if inputs.backlog > 0 && !plan.promote.priority_increase.is_empty() {
        let moved = std::mem::take(&mut plan.promote.priority_increase);
        plan.promote.reindex.extend(moved);
        plan.promote.reindex.sort();
    }

    if !inputs.health.healthy {
        plan.promote.priority_increase.clear();
        plan.promote.reindex.clear();
        plan.meta = PlanMeta {
            health_blocked: true,
            reason: inputs.health.reason.clone(),
        };
    }

    plan
}

/// Loads current state and builds the plan.
///
/// An unreadable kill switch counts as disabled and an unreadable queue as
/// unhealthy, so read failures only ever narrow the plan.
#[instrument(skip_all)]
pub async fn get_seo_execution_plan(db: &DatabaseConnection, cfg: &AppConfig) -> ExecutionPlan {
    let seo_enabled = match SystemConfigRepository::new(db).seo_enabled().await {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!(error = %e, "kill switch unreadable, treating SEO as disabled");
            false
        }
    };

    if !seo_enabled {
        info!("SEO system disabled, returning empty plan");
        return ExecutionPlan::blocked(SEO_DISABLED_REASON);
    }

    let eligible = eligible_locations(db, cfg).await;
    let signals = profit_signals(db, cfg, &eligible).await;
    let actions = classify_actions(&signals, &eligible);

    let promoted: Vec<String> = actions
        .iter()
        .filter(|(_, bucket)| **bucket == ActionBucket::Promote)
        .map(|(key, _)| key.clone())
        .collect();

    let queue_statuses = match IndexQueueRepository::new(db)
        .find_by_location_keys(&promoted)
        .await
    {
        Ok(rows) => {
            let mut by_key: HashMap<String, Vec<QueueStatus>> = HashMap::new();
            for row in rows {
                // Unknown statuses are treated as needing a reindex
                let status = row.status().unwrap_or(QueueStatus::Pending);
                by_key.entry(row.location_key).or_default().push(status);
            }
            Some(by_key)
        }
        Err(e) => {
            warn!(error = %e, "queue rows for promoted locations unreadable");
            None
        }
    };

    let stats = indexing_stats(db, cfg).await;
    let backlog = stats.as_ref().map(|s| s.backlog()).unwrap_or(0);
    let health = health_from_stats(stats, &cfg.health);

    let plan = build_execution_plan(&PlanInputs {
        seo_enabled,
        actions,
        queue_statuses,
        backlog,
        health,
    });

    info!(
        eligible = eligible.len(),
        priority_increase = plan.promote.priority_increase.len(),
        reindex = plan.promote.reindex.len(),
        monitor = plan.maintain.monitor.len(),
        deprioritize = plan.demote.deprioritize.len(),
        stop_indexing = plan.freeze.stop_indexing.len(),
        health_blocked = plan.meta.health_blocked,
        "built SEO execution plan"
    );

    plan
}

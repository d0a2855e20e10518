//! Plan applier: writes an [`ExecutionPlan`] to the registry and queue.
//!
//! Application is idempotent. Each action is skipped when the persisted state
//! already matches it, so applying the same plan twice writes nothing the second
//! time. Each bucket is written as one batch; a failed read or write marks the
//! whole bucket skipped.

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, Set};
use serde::Serialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use super::planner::ExecutionPlan;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::location::{canonical_key, canonical_url};
use crate::models::city_registry::{ActiveModel as RegistryRow, Priority};
use crate::models::index_queue::QueueStatus;
use crate::repositories::{CityRegistryRepository, IndexQueueRepository, PendingUrl};
use crate::telemetry::{METRIC_PLAN_APPLIED, METRIC_PLAN_SKIPPED};

/// Applied and skipped location keys for one action, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

impl ActionOutcome {
    fn all_skipped(keys: impl IntoIterator<Item = String>) -> Self {
        let mut skipped: Vec<String> = keys.into_iter().collect();
        skipped.sort();
        Self {
            applied: Vec::new(),
            skipped,
        }
    }

    fn record(&self, action: &'static str) {
        metrics::counter!(METRIC_PLAN_APPLIED, "action" => action)
            .increment(self.applied.len() as u64);
        metrics::counter!(METRIC_PLAN_SKIPPED, "action" => action)
            .increment(self.skipped.len() as u64);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub priority_increase: ActionOutcome,
    pub reindex: ActionOutcome,
    pub monitor: ActionOutcome,
    pub deprioritize: ActionOutcome,
    pub stop_indexing: ActionOutcome,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes().iter().map(|o| o.applied.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes().iter().map(|o| o.skipped.len()).sum()
    }

    fn outcomes(&self) -> [&ActionOutcome; 5] {
        [
            &self.priority_increase,
            &self.reindex,
            &self.monitor,
            &self.deprioritize,
            &self.stop_indexing,
        ]
    }
}

/// Canonicalizes and deduplicates plan keys. Keys with nothing left after
/// normalization are returned separately so they can be reported as skipped.
fn normalize_keys(keys: &[String]) -> (BTreeSet<String>, Vec<String>) {
    let mut valid = BTreeSet::new();
    let mut invalid = Vec::new();
    for raw in keys {
        let key = canonical_key(raw);
        if key.is_empty() {
            invalid.push(raw.clone());
        } else {
            valid.insert(key);
        }
    }
    (valid, invalid)
}

/// Applies every bucket of `plan`. Never fails: problems surface as skipped keys.
#[instrument(skip_all)]
pub async fn apply_seo_execution_plan(
    db: &DatabaseConnection,
    cfg: &AppConfig,
    plan: &ExecutionPlan,
) -> ApplyReport {
    let report = ApplyReport {
        stop_indexing: apply_freeze(db, &plan.freeze.stop_indexing).await,
        deprioritize: apply_priority(db, &plan.demote.deprioritize, Priority::Low).await,
        priority_increase: apply_priority(db, &plan.promote.priority_increase, Priority::High)
            .await,
        reindex: apply_reindex(db, cfg, &plan.promote.reindex).await,
        monitor: ActionOutcome::all_skipped(normalize_keys(&plan.maintain.monitor).0),
    };

    report.stop_indexing.record("stop_indexing");
    report.deprioritize.record("deprioritize");
    report.priority_increase.record("priority_increase");
    report.reindex.record("reindex");
    report.monitor.record("monitor");

    info!(
        applied = report.applied_count(),
        skipped = report.skipped_count(),
        "applied SEO execution plan"
    );

    report
}

/// Sets registry priority to `target`, preserving the frozen flag.
async fn apply_priority(
    db: &DatabaseConnection,
    keys: &[String],
    target: Priority,
) -> ActionOutcome {
    let (keys, invalid) = normalize_keys(keys);
    if keys.is_empty() {
        return ActionOutcome::all_skipped(invalid);
    }

    let repo = CityRegistryRepository::new(db);
    let key_list: Vec<String> = keys.iter().cloned().collect();
    let current = match repo.find_by_keys(&key_list).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %PipelineError::query("registry_priority", e), "skipping priority bucket");
            return ActionOutcome::all_skipped(keys.into_iter().chain(invalid));
        }
    };

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut skipped = invalid;
    let mut to_write = Vec::new();
    let mut rows = Vec::new();

    for key in keys {
        match current.get(&key) {
            Some(existing) if existing.priority() == target => skipped.push(key),
            existing => {
                rows.push(RegistryRow {
                    location_key: Set(key.clone()),
                    priority: Set(target.as_str().to_string()),
                    is_frozen: Set(existing.map(|r| r.is_frozen).unwrap_or(false)),
                    created_at: Set(now),
                    updated_at: Set(now),
                });
                to_write.push(key);
            }
        }
    }

    write_registry(&repo, rows, to_write, skipped, "registry_priority").await
}

/// Freezes locations, preserving priority (or `normal` for new rows).
async fn apply_freeze(db: &DatabaseConnection, keys: &[String]) -> ActionOutcome {
    let (keys, invalid) = normalize_keys(keys);
    if keys.is_empty() {
        return ActionOutcome::all_skipped(invalid);
    }

    let repo = CityRegistryRepository::new(db);
    let key_list: Vec<String> = keys.iter().cloned().collect();
    let current = match repo.find_by_keys(&key_list).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %PipelineError::query("registry_freeze", e), "skipping freeze bucket");
            return ActionOutcome::all_skipped(keys.into_iter().chain(invalid));
        }
    };

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut skipped = invalid;
    let mut to_write = Vec::new();
    let mut rows = Vec::new();

    for key in keys {
        match current.get(&key) {
            Some(existing) if existing.is_frozen => skipped.push(key),
            existing => {
                let priority = existing.map(|r| r.priority()).unwrap_or_default();
                rows.push(RegistryRow {
                    location_key: Set(key.clone()),
                    priority: Set(priority.as_str().to_string()),
                    is_frozen: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                });
                to_write.push(key);
            }
        }
    }

    write_registry(&repo, rows, to_write, skipped, "registry_freeze").await
}

async fn write_registry(
    repo: &CityRegistryRepository<'_>,
    rows: Vec<RegistryRow>,
    to_write: Vec<String>,
    mut skipped: Vec<String>,
    operation: &'static str,
) -> ActionOutcome {
    let mut applied = Vec::new();
    match repo.upsert_many(rows).await {
        Ok(_) => applied = to_write,
        Err(e) => {
            error!(
                error = %PipelineError::write(operation, e),
                keys = to_write.len(),
                "registry batch write failed, marking batch skipped"
            );
            skipped.extend(to_write);
        }
    }

    applied.sort();
    skipped.sort();
    ActionOutcome { applied, skipped }
}

/// Requeues each location's canonical URL as pending with a fresh retry budget.
/// URLs already pending are left alone.
async fn apply_reindex(db: &DatabaseConnection, cfg: &AppConfig, keys: &[String]) -> ActionOutcome {
    let (keys, invalid) = normalize_keys(keys);
    if keys.is_empty() {
        return ActionOutcome::all_skipped(invalid);
    }

    let repo = IndexQueueRepository::new(db);
    let targets: Vec<PendingUrl> = keys
        .iter()
        .map(|key| PendingUrl {
            url: canonical_url(&cfg.indexing, key),
            location_key: key.clone(),
        })
        .collect();
    let urls: Vec<String> = targets.iter().map(|t| t.url.clone()).collect();

    let current = match repo.find_by_urls(&urls).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %PipelineError::query("reindex", e), "skipping reindex bucket");
            return ActionOutcome::all_skipped(keys.into_iter().chain(invalid));
        }
    };

    let mut skipped = invalid;
    let mut to_write = Vec::new();
    let mut pending = Vec::new();

    for target in targets {
        let already_pending = current
            .get(&target.url)
            .is_some_and(|row| row.status() == Some(QueueStatus::Pending));

        if already_pending {
            skipped.push(target.location_key);
        } else {
            to_write.push(target.location_key.clone());
            pending.push(target);
        }
    }

    let mut applied = Vec::new();
    match repo.upsert_pending(pending).await {
        Ok(_) => applied = to_write,
        Err(e) => {
            error!(
                error = %PipelineError::write("reindex", e),
                keys = to_write.len(),
                "queue batch write failed, marking batch skipped"
            );
            skipped.extend(to_write);
        }
    }

    applied.sort();
    skipped.sort();
    ActionOutcome { applied, skipped }
}

//! Health monitor for the indexing queue.
//!
//! [`evaluate_health`] is the pure decision over a stats snapshot; the async
//! functions load that snapshot from the store.

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::{AppConfig, HealthConfig};
use crate::error::PipelineError;
use crate::models::index_queue::{Model as QueueEntry, QueueStatus};
use crate::repositories::IndexQueueRepository;
use crate::telemetry::{METRIC_QUEUE_BACKLOG, METRIC_QUEUE_HEALTHY};

pub const HEALTH_UNAVAILABLE_REASON: &str = "health check unavailable";

/// Queue totals from one full scan.
///
/// `failed` counts every row in a failure state (`failed` or `dead`). `retrying`
/// and `dead` partition those rows by remaining retry budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexingStats {
    pub total: u64,
    pub pending: u64,
    pub submitted: u64,
    pub failed: u64,
    pub retrying: u64,
    pub dead: u64,
}

impl IndexingStats {
    /// Tallies `(status, attempts)` pairs. Unknown statuses only count toward `total`.
    pub fn tally<'a, I>(rows: I, max_attempts: i32) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut stats = IndexingStats::default();
        for (status, attempts) in rows {
            stats.total += 1;
            match status.parse::<QueueStatus>() {
                Ok(QueueStatus::Pending) => stats.pending += 1,
                Ok(QueueStatus::Submitted) => stats.submitted += 1,
                Ok(QueueStatus::Failed) => {
                    stats.failed += 1;
                    if attempts < max_attempts {
                        stats.retrying += 1;
                    } else {
                        stats.dead += 1;
                    }
                }
                Ok(QueueStatus::Dead) => {
                    stats.failed += 1;
                    stats.dead += 1;
                }
                Err(_) => {}
            }
        }
        stats
    }

    /// Rows still waiting for a (re)submission.
    pub fn backlog(&self) -> u64 {
        self.pending + self.retrying
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthFlags {
    pub backlog_too_large: bool,
    pub too_many_failures: bool,
    pub too_many_dead: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub healthy: bool,
    pub reason: Option<String>,
    pub flags: HealthFlags,
}

impl HealthState {
    /// Fail-closed state used when the queue cannot be read.
    pub fn unavailable() -> Self {
        Self {
            healthy: false,
            reason: Some(HEALTH_UNAVAILABLE_REASON.to_string()),
            flags: HealthFlags::default(),
        }
    }
}

/// Operator view: totals plus the most recent failures and submissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpsSnapshot {
    #[serde(flatten)]
    pub totals: IndexingStats,
    #[schema(value_type = Vec<Object>)]
    pub recent_failures: Vec<QueueEntry>,
    #[schema(value_type = Vec<Object>)]
    pub recent_submissions: Vec<QueueEntry>,
}

/// Applies the queue thresholds to a stats snapshot.
pub fn evaluate_health(stats: &IndexingStats, thresholds: &HealthConfig) -> HealthState {
    let failure_ratio = if stats.total == 0 {
        0.0
    } else {
        stats.failed as f64 / stats.total as f64
    };

    let flags = HealthFlags {
        backlog_too_large: stats.backlog() > thresholds.max_backlog,
        too_many_failures: failure_ratio > thresholds.max_failure_ratio,
        too_many_dead: stats.dead > thresholds.max_dead,
    };

    let triggered: Vec<&str> = [
        (flags.backlog_too_large, "backlogTooLarge"),
        (flags.too_many_failures, "tooManyFailures"),
        (flags.too_many_dead, "tooManyDead"),
    ]
    .into_iter()
    .filter_map(|(raised, name)| raised.then_some(name))
    .collect();

    HealthState {
        healthy: triggered.is_empty(),
        reason: (!triggered.is_empty()).then(|| triggered.join(",")),
        flags,
    }
}

/// Full-scan queue totals.
pub async fn indexing_stats(
    db: &DatabaseConnection,
    cfg: &AppConfig,
) -> Result<IndexingStats, PipelineError> {
    let rows = IndexQueueRepository::new(db)
        .status_attempts()
        .await
        .map_err(|e| PipelineError::query("indexing_stats", e))?;

    Ok(IndexingStats::tally(
        rows.iter().map(|(status, attempts)| (status.as_str(), *attempts)),
        cfg.indexing.max_attempts,
    ))
}

/// Totals plus the most recent failed-state and submitted rows.
pub async fn ops_snapshot(
    db: &DatabaseConnection,
    cfg: &AppConfig,
) -> Result<OpsSnapshot, PipelineError> {
    let totals = indexing_stats(db, cfg).await?;
    let repo = IndexQueueRepository::new(db);
    let limit = cfg.health.snapshot_limit;

    let recent_failures = repo
        .recent_with_status(&[QueueStatus::Failed, QueueStatus::Dead], limit)
        .await
        .map_err(|e| PipelineError::query("ops_snapshot", e))?;
    let recent_submissions = repo
        .recent_with_status(&[QueueStatus::Submitted], limit)
        .await
        .map_err(|e| PipelineError::query("ops_snapshot", e))?;

    Ok(OpsSnapshot {
        totals,
        recent_failures,
        recent_submissions,
    })
}

/// Health derived from a stats read result; publishes the queue gauges.
pub(crate) fn health_from_stats(
    stats: Result<IndexingStats, PipelineError>,
    thresholds: &HealthConfig,
) -> HealthState {
    match stats {
        Ok(stats) => {
            let state = evaluate_health(&stats, thresholds);
            metrics::gauge!(METRIC_QUEUE_BACKLOG).set(stats.backlog() as f64);
            metrics::gauge!(METRIC_QUEUE_HEALTHY).set(if state.healthy { 1.0 } else { 0.0 });
            debug!(
                healthy = state.healthy,
                backlog = stats.backlog(),
                failed = stats.failed,
                dead = stats.dead,
                "evaluated queue health"
            );
            state
        }
        Err(e) => {
            warn!(error = %e, "queue health could not be read, failing closed");
            metrics::gauge!(METRIC_QUEUE_HEALTHY).set(0.0);
            HealthState::unavailable()
        }
    }
}

/// Current queue health. Never errors: an unreadable store is unhealthy.
pub async fn health_state(db: &DatabaseConnection, cfg: &AppConfig) -> HealthState {
    health_from_stats(indexing_stats(db, cfg).await, &cfg.health)
}

//! Queue processor
//!
//! One run: check preconditions, lease selectable rows until a full batch is
//! submittable (rows of frozen locations and duplicate URLs are skipped and
//! released), obtain a bearer token, then submit with bounded concurrency and
//! record each outcome.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::client::IndexingApi;
use crate::config::AppConfig;
use crate::models::index_queue::{Model as QueueEntry, QueueStatus};
use crate::repositories::{CityRegistryRepository, IndexQueueRepository, SystemConfigRepository};
use crate::seo::health::health_state;
use crate::seo::planner::SEO_DISABLED_REASON;
use crate::telemetry::{METRIC_RUN_DURATION, METRIC_RUNS_BLOCKED, METRIC_SUBMISSIONS};

pub const MISSING_CREDENTIALS_REASON: &str = "indexing credentials not configured";

/// Outcome of one processor run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    /// Rows submitted to the indexing API this run
    pub processed: u64,
    pub successes: u64,
    pub failures: u64,
    /// Rows leased but not submitted (frozen location or duplicate URL)
    pub skipped: u64,
    pub blocked: bool,
    pub reason: Option<String>,
}

impl ProcessSummary {
    fn blocked(reason: impl Into<String>) -> Self {
        counter!(METRIC_RUNS_BLOCKED).increment(1);
        Self {
            blocked: true,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct LeasedRows {
    to_submit: Vec<QueueEntry>,
    skipped: Vec<QueueEntry>,
}

enum SubmissionOutcome {
    Submitted,
    Failed,
}

/// Drives URL submissions from the index queue to the indexing API
#[derive(Clone)]
pub struct QueueProcessor {
    db: DatabaseConnection,
    config: Arc<AppConfig>,
    api: Arc<dyn IndexingApi>,
}

impl QueueProcessor {
    pub fn new(db: DatabaseConnection, config: Arc<AppConfig>, api: Arc<dyn IndexingApi>) -> Self {
        Self { db, config, api }
    }

    /// Executes one run. Never fails; every problem is reported in the summary.
    #[instrument(skip(self), fields(batch_size = self.config.indexing.batch_size))]
    pub async fn run(&self) -> ProcessSummary {
        let timer = std::time::Instant::now();

        match SystemConfigRepository::new(&self.db).seo_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("SEO disabled, skipping queue run");
                return ProcessSummary::blocked(SEO_DISABLED_REASON);
            }
            Err(e) => {
                warn!(error = %e, "kill switch unreadable, skipping queue run");
                return ProcessSummary::blocked(SEO_DISABLED_REASON);
            }
        }

        let health = health_state(&self.db, &self.config).await;
        if !health.healthy {
            let reason = health
                .reason
                .unwrap_or_else(|| "indexing queue unhealthy".to_string());
            info!(%reason, "queue unhealthy, skipping queue run");
            return ProcessSummary::blocked(reason);
        }

        if !self.api.is_configured() {
            warn!("indexing credentials missing, skipping queue run");
            return ProcessSummary::blocked(MISSING_CREDENTIALS_REASON);
        }

        let worker_id = format!("worker-{}", Uuid::new_v4());
        let indexing = &self.config.indexing;

        let mut summary = ProcessSummary::default();
        let LeasedRows { to_submit, skipped } = match self.lease_rows(&worker_id).await {
            Ok(leased) => leased,
            Err((leased, reason)) => {
                let held: Vec<QueueEntry> =
                    leased.to_submit.into_iter().chain(leased.skipped).collect();
                self.release(&worker_id, &held).await;
                summary.skipped = held.len() as u64;
                summary.reason = Some(reason);
                return summary;
            }
        };

        summary.skipped = skipped.len() as u64;
        self.release(&worker_id, &skipped).await;

        if to_submit.is_empty() {
            debug!(skipped = summary.skipped, "no submittable queue rows");
            return summary;
        }

        let token = match self.api.access_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "indexing authentication failed, aborting run");
                self.release(&worker_id, &to_submit).await;
                summary.blocked = true;
                summary.reason = Some(format!("authentication failed: {}", e));
                counter!(METRIC_RUNS_BLOCKED).increment(1);
                return summary;
            }
        };

        let semaphore = Arc::new(Semaphore::new(indexing.concurrency.max(1)));
        let token = Arc::new(token);
        let worker_id = Arc::new(worker_id);
        let mut handles = Vec::with_capacity(to_submit.len());

        for entry in to_submit {
            let processor = self.clone();
            let token = Arc::clone(&token);
            let worker_id = Arc::clone(&worker_id);
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                processor.submit(&worker_id, &token, entry).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(SubmissionOutcome::Submitted) => summary.successes += 1,
                Ok(SubmissionOutcome::Failed) => summary.failures += 1,
                Err(e) => {
                    // Row keeps its lease and becomes selectable once it expires
                    error!(error = %e, "submission task panicked");
                    summary.failures += 1;
                }
            }
        }
        summary.processed = summary.successes + summary.failures;

        histogram!(METRIC_RUN_DURATION).record(timer.elapsed().as_secs_f64() * 1_000.0);
        info!(
            processed = summary.processed,
            successes = summary.successes,
            failures = summary.failures,
            skipped = summary.skipped,
            "queue run completed"
        );

        summary
    }

    /// Leases rows until `batch_size` of them are submittable or nothing
    /// selectable is left.
    ///
    /// Skipped rows keep this worker's lease until the run ends, so each further
    /// claim moves past them instead of returning the same frozen rows. On error
    /// everything leased so far is handed back with the reason.
    async fn lease_rows(&self, worker_id: &str) -> Result<LeasedRows, (LeasedRows, String)> {
        let indexing = &self.config.indexing;
        let queue = IndexQueueRepository::new(&self.db);
        let lease = Duration::seconds(indexing.lease_seconds as i64);
        let mut leased = LeasedRows::default();
        let mut seen_urls = HashSet::new();
        let mut held = HashSet::new();

        loop {
            let wanted = indexing
                .batch_size
                .saturating_sub(leased.to_submit.len() as u64);
            if wanted == 0 {
                break;
            }

            let rows = match queue
                .claim_batch(worker_id, wanted, indexing.max_attempts, lease)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    error!(error = %e, "failed to lease queue rows");
                    return Err((leased, format!("queue unavailable: {}", e)));
                }
            };
            // A lease shorter than one loop iteration would hand back rows
            // this run already holds
            let rows: Vec<QueueEntry> =
                rows.into_iter().filter(|row| held.insert(row.id)).collect();
            if rows.is_empty() {
                break;
            }

            if let Err((rows, reason)) = self.partition(rows, &mut seen_urls, &mut leased).await {
                leased.skipped.extend(rows);
                return Err((leased, reason));
            }
        }

        Ok(leased)
    }

    /// Sorts freshly claimed rows into `leased`, skipping frozen locations and
    /// repeated URLs. If frozen state cannot be read the rows are handed back.
    async fn partition(
        &self,
        rows: Vec<QueueEntry>,
        seen_urls: &mut HashSet<String>,
        leased: &mut LeasedRows,
    ) -> Result<(), (Vec<QueueEntry>, String)> {
        let keys: Vec<String> = rows
            .iter()
            .map(|e| e.location_key.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let frozen = match CityRegistryRepository::new(&self.db).frozen_keys(&keys).await {
            Ok(frozen) => frozen,
            Err(e) => {
                error!(error = %e, "frozen state unreadable, submitting nothing");
                return Err((rows, format!("registry unavailable: {}", e)));
            }
        };

        for entry in rows {
            if frozen.contains(&entry.location_key) {
                debug!(url = %entry.url, location_key = %entry.location_key, "skipping frozen location");
                leased.skipped.push(entry);
            } else if !seen_urls.insert(entry.url.clone()) {
                debug!(url = %entry.url, "skipping duplicate url in batch");
                leased.skipped.push(entry);
            } else {
                leased.to_submit.push(entry);
            }
        }

        Ok(())
    }

    async fn release(&self, worker_id: &str, rows: &[QueueEntry]) {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        if let Err(e) = IndexQueueRepository::new(&self.db)
            .release(worker_id, &ids)
            .await
        {
            // Leases expire on their own
            warn!(error = %e, rows = ids.len(), "failed to release queue leases");
        }
    }

    #[instrument(skip(self, worker_id, token, entry), fields(url = %entry.url, attempts = entry.attempts))]
    async fn submit(&self, worker_id: &str, token: &str, entry: QueueEntry) -> SubmissionOutcome {
        let queue = IndexQueueRepository::new(&self.db);

        match self.api.publish(token, &entry.url).await {
            Ok(()) => {
                counter!(METRIC_SUBMISSIONS, "outcome" => "submitted").increment(1);
                if let Err(e) = queue.mark_submitted(worker_id, entry.id).await {
                    error!(error = %e, "failed to record submission");
                }
                info!("url submitted for indexing");
                SubmissionOutcome::Submitted
            }
            Err(err) => {
                let attempts = entry.attempts + 1;
                let status = if attempts >= self.config.indexing.max_attempts {
                    QueueStatus::Dead
                } else {
                    QueueStatus::Failed
                };

                counter!(METRIC_SUBMISSIONS, "outcome" => status.as_str()).increment(1);
                warn!(
                    error = %err,
                    retryable = err.is_retryable(),
                    new_attempts = attempts,
                    %status,
                    "indexing submission failed"
                );

                if let Err(e) = queue.mark_failed(worker_id, entry.id, attempts, status).await {
                    error!(error = %e, "failed to record submission failure");
                }
                SubmissionOutcome::Failed
            }
        }
    }
}

//! Queue processor runs against an in-memory store and a scripted indexing API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

use seo_pipeline::config::AppConfig;
use seo_pipeline::error::PipelineError;
use seo_pipeline::indexing::processor::MISSING_CREDENTIALS_REASON;
use seo_pipeline::indexing::{IndexingApi, QueueProcessor};
use seo_pipeline::repositories::IndexQueueRepository;

mod test_utils;
use test_utils::{
    insert_queue_row, insert_queue_rows, insert_registry, queue_row, queue_rows,
    setup_enabled_db, setup_test_db,
};

const TOKEN: &str = "ya29.test-token";

fn url(key: &str) -> String {
    format!("http://localhost:3000/destinations/{}", key)
}

#[derive(Default)]
struct ScriptedIndexingApi {
    unconfigured: bool,
    reject_token: bool,
    failing_urls: HashSet<String>,
    published: Mutex<Vec<String>>,
    token_requests: AtomicUsize,
}

impl ScriptedIndexingApi {
    fn failing(urls: &[String]) -> Self {
        Self {
            failing_urls: urls.iter().cloned().collect(),
            ..Self::default()
        }
    }

    fn published(&self) -> Vec<String> {
        let mut urls = self.published.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

#[async_trait]
impl IndexingApi for ScriptedIndexingApi {
    fn is_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        if self.reject_token {
            return Err(PipelineError::ExternalSubmission {
                status: Some(401),
                message: "token exchange rejected: invalid_grant".into(),
            });
        }
        Ok(TOKEN.to_string())
    }

    async fn publish(&self, access_token: &str, url: &str) -> Result<(), PipelineError> {
        assert_eq!(access_token, TOKEN);
        self.published.lock().unwrap().push(url.to_string());
        if self.failing_urls.contains(url) {
            return Err(PipelineError::ExternalSubmission {
                status: Some(500),
                message: "backend error".into(),
            });
        }
        Ok(())
    }
}

fn processor(
    db: &sea_orm::DatabaseConnection,
    api: Arc<ScriptedIndexingApi>,
) -> QueueProcessor {
    QueueProcessor::new(db.clone(), Arc::new(AppConfig::default()), api)
}

#[tokio::test]
async fn test_pending_rows_are_submitted() -> Result<()> {
    let db = setup_enabled_db().await?;
    let paris = insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;
    let rome = insert_queue_row(&db, &url("rome"), "rome", "failed", 1, 20).await?;
    // Keeps the failure ratio under the health threshold
    insert_queue_rows(&db, "done", "submitted", 0, 5).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert!(!summary.blocked, "{:?}", summary);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.successes, 2);
    assert_eq!(summary.failures, 0);
    assert_eq!(api.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(api.published(), vec![url("paris"), url("rome")]);

    for id in [paris, rome] {
        let row = queue_row(&db, id).await?;
        assert_eq!(row.status, "submitted");
        assert!(row.last_attempt_at.is_some());
        assert!(row.claimed_by.is_none());
    }
    // Success leaves the attempt count alone
    assert_eq!(queue_row(&db, rome).await?.attempts, 1);
    Ok(())
}

#[tokio::test]
async fn test_frozen_locations_are_skipped() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_registry(&db, "lisbon", "normal", true).await?;
    insert_registry(&db, "porto", "high", true).await?;
    let lisbon = insert_queue_row(&db, &url("lisbon"), "lisbon", "pending", 0, 30).await?;
    insert_queue_row(&db, &url("porto"), "porto", "pending", 0, 20).await?;
    insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 10).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.successes, 1);
    assert_eq!(api.published(), vec![url("paris")]);

    let frozen = queue_row(&db, lisbon).await?;
    assert_eq!(frozen.status, "pending");
    assert!(frozen.claimed_by.is_none(), "skipped rows are released");
    Ok(())
}

#[tokio::test]
async fn test_frozen_backlog_does_not_starve_newer_rows() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_registry(&db, "venice", "normal", true).await?;
    // More frozen rows than one batch, all older than the live row
    for i in 0..12 {
        let page = format!("venice-{}", i);
        insert_queue_row(&db, &url(&page), "venice", "pending", 0, 100 + i).await?;
    }
    let paris = insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 10).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert!(!summary.blocked, "{:?}", summary);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.successes, 1);
    assert_eq!(summary.skipped, 12);
    assert_eq!(api.published(), vec![url("paris")]);
    assert_eq!(queue_row(&db, paris).await?.status, "submitted");

    let frozen: Vec<_> = queue_rows(&db)
        .await?
        .into_iter()
        .filter(|row| row.location_key == "venice")
        .collect();
    assert_eq!(frozen.len(), 12);
    assert!(
        frozen
            .iter()
            .all(|row| row.status == "pending" && row.claimed_by.is_none()),
        "frozen rows stay pending and unleased"
    );
    Ok(())
}

#[tokio::test]
async fn test_full_batch_is_filled_past_frozen_rows() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_registry(&db, "venice", "normal", true).await?;
    for i in 0..5 {
        let page = format!("venice-{}", i);
        insert_queue_row(&db, &url(&page), "venice", "pending", 0, 100 + i).await?;
    }
    insert_queue_rows(&db, "city", "pending", 0, 15).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert_eq!(summary.processed, 10, "batch size counts submittable rows");
    assert_eq!(summary.skipped, 5);
    assert!(api.published().iter().all(|u| !u.contains("venice")));
    Ok(())
}

#[tokio::test]
async fn test_failures_exhaust_retry_budget() -> Result<()> {
    let db = setup_enabled_db().await?;
    let tired = insert_queue_row(&db, &url("paris"), "paris", "failed", 2, 30).await?;
    let fresh = insert_queue_row(&db, &url("rome"), "rome", "pending", 0, 20).await?;
    // Keeps the failure ratio under the health threshold
    insert_queue_rows(&db, "done", "submitted", 0, 10).await?;

    let api = Arc::new(ScriptedIndexingApi::failing(&[url("paris"), url("rome")]));
    let summary = processor(&db, api.clone()).run().await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failures, 2);

    let dead = queue_row(&db, tired).await?;
    assert_eq!(dead.status, "dead");
    assert_eq!(dead.attempts, 3);

    let retrying = queue_row(&db, fresh).await?;
    assert_eq!(retrying.status, "failed");
    assert_eq!(retrying.attempts, 1);

    // Only the row with budget left is picked up again
    let second = processor(&db, api.clone()).run().await;
    assert!(!second.blocked, "{:?}", second);
    assert_eq!(second.processed, 1);
    assert_eq!(queue_row(&db, fresh).await?.attempts, 2);
    assert_eq!(queue_row(&db, tired).await?.attempts, 3);
    Ok(())
}

#[tokio::test]
async fn test_disabled_kill_switch_blocks_run() -> Result<()> {
    let db = setup_test_db().await?;
    insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert!(summary.blocked);
    assert_eq!(summary.reason.as_deref(), Some("SEO system disabled"));
    assert_eq!(summary.processed, 0);
    assert_eq!(api.token_requests.load(Ordering::SeqCst), 0);
    assert!(api.published().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unhealthy_queue_blocks_run() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_queue_rows(&db, "waiting", "pending", 0, 101).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert!(summary.blocked);
    assert_eq!(summary.reason.as_deref(), Some("backlogTooLarge"));
    assert!(api.published().is_empty());

    let claimed = IndexQueueRepository::new(&db)
        .claim_batch("inspector", 500, 3, Duration::seconds(300))
        .await?;
    assert_eq!(claimed.len(), 101, "no row was leased by the blocked run");
    Ok(())
}

#[tokio::test]
async fn test_missing_credentials_block_run() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;

    let api = Arc::new(ScriptedIndexingApi {
        unconfigured: true,
        ..ScriptedIndexingApi::default()
    });
    let summary = processor(&db, api.clone()).run().await;

    assert!(summary.blocked);
    assert_eq!(summary.reason.as_deref(), Some(MISSING_CREDENTIALS_REASON));
    assert_eq!(api.token_requests.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_auth_failure_releases_leases() -> Result<()> {
    let db = setup_enabled_db().await?;
    let paris = insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;

    let api = Arc::new(ScriptedIndexingApi {
        reject_token: true,
        ..ScriptedIndexingApi::default()
    });
    let summary = processor(&db, api.clone()).run().await;

    assert!(summary.blocked);
    assert!(
        summary
            .reason
            .as_deref()
            .is_some_and(|r| r.starts_with("authentication failed"))
    );
    assert_eq!(summary.processed, 0);
    assert!(api.published().is_empty());

    let row = queue_row(&db, paris).await?;
    assert_eq!(row.status, "pending");
    assert_eq!(row.attempts, 0);
    assert!(row.claimed_by.is_none());
    assert!(row.claimed_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_batch_size_caps_one_run() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_queue_rows(&db, "city", "pending", 0, 15).await?;

    let api = Arc::new(ScriptedIndexingApi::default());
    let summary = processor(&db, api.clone()).run().await;

    assert_eq!(summary.processed, 10);
    assert_eq!(api.published().len(), 10);

    let second = processor(&db, api.clone()).run().await;
    assert_eq!(second.processed, 5);
    Ok(())
}

#[tokio::test]
async fn test_live_lease_prevents_double_claim() -> Result<()> {
    let db = setup_enabled_db().await?;
    insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;
    insert_queue_row(&db, &url("rome"), "rome", "failed", 1, 20).await?;
    insert_queue_row(&db, &url("oslo"), "oslo", "dead", 3, 10).await?;
    let repo = IndexQueueRepository::new(&db);
    let lease = Duration::seconds(300);

    let first = repo.claim_batch("worker-a", 10, 3, lease).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].url, url("paris"), "oldest rows are claimed first");
    assert!(first.iter().all(|r| r.claimed_by.as_deref() == Some("worker-a")));

    let second = repo.claim_batch("worker-b", 10, 3, lease).await?;
    assert!(second.is_empty());

    // Another worker cannot release leases it does not hold
    let ids: Vec<_> = first.iter().map(|r| r.id).collect();
    assert_eq!(repo.release("worker-b", &ids).await?, 0);
    assert_eq!(repo.release("worker-a", &ids).await?, 2);

    let third = repo.claim_batch("worker-b", 10, 3, lease).await?;
    assert_eq!(third.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed() -> Result<()> {
    let db = setup_enabled_db().await?;
    let id = insert_queue_row(&db, &url("paris"), "paris", "pending", 0, 30).await?;
    let repo = IndexQueueRepository::new(&db);
    let lease = Duration::seconds(300);

    assert_eq!(repo.claim_batch("worker-a", 10, 3, lease).await?.len(), 1);

    // Simulate worker-a dying ten minutes ago
    let stale: DateTimeWithTimeZone = (Utc::now() - Duration::minutes(10)).into();
    let mut row = queue_row(&db, id).await?.into_active_model();
    row.claimed_at = Set(Some(stale));
    row.update(&db).await?;

    let reclaimed = repo.claim_batch("worker-b", 10, 3, lease).await?;
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].claimed_by.as_deref(), Some("worker-b"));

    // The stale worker can no longer record an outcome
    assert_eq!(repo.mark_submitted("worker-a", id).await?, 0);
    assert_eq!(repo.mark_submitted("worker-b", id).await?, 1);
    assert_eq!(queue_row(&db, id).await?.status, "submitted");
    Ok(())
}

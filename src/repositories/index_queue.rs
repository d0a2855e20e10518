//! # Index Queue Repository
//!
//! Data access for the URL submission queue: lookups for the planner and applier,
//! the health scan, and the lease-based claim/transition helpers used by the
//! queue processor.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::models::index_queue::{self, ActiveModel, Entity as IndexQueue, Model, QueueStatus};

/// A URL to (re)queue as `pending`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUrl {
    pub url: String,
    pub location_key: String,
}

/// Repository for `index_queue` rows
pub struct IndexQueueRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> IndexQueueRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<Model>, DbErr> {
        IndexQueue::find()
            .filter(index_queue::Column::Url.eq(url))
            .one(self.db)
            .await
    }

    /// Existing rows for the given URLs, indexed by URL.
    pub async fn find_by_urls(&self, urls: &[String]) -> Result<HashMap<String, Model>, DbErr> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = IndexQueue::find()
            .filter(index_queue::Column::Url.is_in(urls.iter().cloned()))
            .all(self.db)
            .await?;

        Ok(rows.into_iter().map(|row| (row.url.clone(), row)).collect())
    }

    /// Every row belonging to the given locations.
    pub async fn find_by_location_keys(&self, keys: &[String]) -> Result<Vec<Model>, DbErr> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        IndexQueue::find()
            .filter(index_queue::Column::LocationKey.is_in(keys.iter().cloned()))
            .order_by_asc(index_queue::Column::CreatedAt)
            .all(self.db)
            .await
    }

    /// `(status, attempts)` for every row; the health scan needs nothing else.
    pub async fn status_attempts(&self) -> Result<Vec<(String, i32)>, DbErr> {
        IndexQueue::find()
            .select_only()
            .column(index_queue::Column::Status)
            .column(index_queue::Column::Attempts)
            .into_tuple()
            .all(self.db)
            .await
    }

    /// Most recently touched rows in any of `statuses`.
    pub async fn recent_with_status(
        &self,
        statuses: &[QueueStatus],
        limit: u64,
    ) -> Result<Vec<Model>, DbErr> {
        IndexQueue::find()
            .filter(index_queue::Column::Status.is_in(statuses.iter().map(|s| s.as_str())))
            .order_by_desc(index_queue::Column::UpdatedAt)
            .order_by_desc(index_queue::Column::CreatedAt)
            .limit(limit)
            .all(self.db)
            .await
    }

    /// Queues a single URL as pending. Existing rows are reset the same way a
    /// reindex action resets them.
    pub async fn enqueue(&self, url: &str, location_key: &str) -> Result<Model, DbErr> {
        self.upsert_pending(vec![PendingUrl {
            url: url.to_string(),
            location_key: location_key.to_string(),
        }])
        .await?;

        self.find_by_url(url)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("index_queue url {}", url)))
    }

    /// Upserts every URL as `pending` with a fresh retry budget and no lease.
    pub async fn upsert_pending(&self, urls: Vec<PendingUrl>) -> Result<u64, DbErr> {
        if urls.is_empty() {
            return Ok(0);
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let rows = urls.into_iter().map(|p| ActiveModel {
            id: Set(Uuid::new_v4()),
            url: Set(p.url),
            location_key: Set(p.location_key),
            status: Set(QueueStatus::Pending.as_str().to_string()),
            attempts: Set(0),
            last_attempt_at: Set(None),
            claimed_by: Set(None),
            claimed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        });

        IndexQueue::insert_many(rows)
            .on_conflict(
                OnConflict::column(index_queue::Column::Url)
                    .update_columns([
                        index_queue::Column::LocationKey,
                        index_queue::Column::Status,
                        index_queue::Column::Attempts,
                        index_queue::Column::LastAttemptAt,
                        index_queue::Column::ClaimedBy,
                        index_queue::Column::ClaimedAt,
                        index_queue::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
    }

    /// Leases up to `batch_size` selectable rows for `worker_id`.
    ///
    /// Selectable means status `pending`/`failed`, attempts below `max_attempts`,
    /// and no live lease. Candidates are picked oldest-created first, then claimed
    /// with a conditional update so two workers never hold the same row. Only rows
    /// this worker actually claimed are returned.
    pub async fn claim_batch(
        &self,
        worker_id: &str,
        batch_size: u64,
        max_attempts: i32,
        lease: Duration,
    ) -> Result<Vec<Model>, DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let lease_cutoff = now - lease;
        let txn = self.db.begin().await?;

        let unleased = Condition::any()
            .add(index_queue::Column::ClaimedAt.is_null())
            .add(index_queue::Column::ClaimedAt.lt(lease_cutoff));

        let candidates: Vec<Uuid> = IndexQueue::find()
            .select_only()
            .column(index_queue::Column::Id)
            .filter(index_queue::Column::Status.is_in(QueueStatus::selectable()))
            .filter(index_queue::Column::Attempts.lt(max_attempts))
            .filter(unleased.clone())
            .order_by_asc(index_queue::Column::CreatedAt)
            .limit(batch_size)
            .into_tuple()
            .all(&txn)
            .await?;

        if candidates.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        let claimed = IndexQueue::update_many()
            .col_expr(index_queue::Column::ClaimedBy, Expr::value(worker_id))
            .col_expr(index_queue::Column::ClaimedAt, Expr::value(now))
            .filter(index_queue::Column::Id.is_in(candidates.clone()))
            // Re-check under the update in case another worker got there first
            .filter(index_queue::Column::Status.is_in(QueueStatus::selectable()))
            .filter(unleased)
            .exec(&txn)
            .await?;

        let rows = if claimed.rows_affected > 0 {
            IndexQueue::find()
                .filter(index_queue::Column::Id.is_in(candidates))
                .filter(index_queue::Column::ClaimedBy.eq(worker_id))
                .order_by_asc(index_queue::Column::CreatedAt)
                .all(&txn)
                .await?
        } else {
            Vec::new()
        };

        txn.commit().await?;
        Ok(rows)
    }

    /// Drops this worker's lease on the given rows without any state transition.
    pub async fn release(&self, worker_id: &str, ids: &[Uuid]) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = IndexQueue::update_many()
            .col_expr(
                index_queue::Column::ClaimedBy,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                index_queue::Column::ClaimedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .filter(index_queue::Column::Id.is_in(ids.iter().copied()))
            .filter(index_queue::Column::ClaimedBy.eq(worker_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// 2xx from the indexing API: `submitted`, attempts untouched, lease dropped.
    pub async fn mark_submitted(&self, worker_id: &str, id: Uuid) -> Result<u64, DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        let result = IndexQueue::update_many()
            .col_expr(
                index_queue::Column::Status,
                Expr::value(QueueStatus::Submitted.as_str()),
            )
            .col_expr(index_queue::Column::LastAttemptAt, Expr::value(now))
            .col_expr(index_queue::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                index_queue::Column::ClaimedBy,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                index_queue::Column::ClaimedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .filter(index_queue::Column::Id.eq(id))
            .filter(index_queue::Column::ClaimedBy.eq(worker_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Failed submission: records the new attempt count and `failed` or `dead`.
    pub async fn mark_failed(
        &self,
        worker_id: &str,
        id: Uuid,
        attempts: i32,
        status: QueueStatus,
    ) -> Result<u64, DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        let result = IndexQueue::update_many()
            .col_expr(index_queue::Column::Status, Expr::value(status.as_str()))
            .col_expr(index_queue::Column::Attempts, Expr::value(attempts))
            .col_expr(index_queue::Column::LastAttemptAt, Expr::value(now))
            .col_expr(index_queue::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                index_queue::Column::ClaimedBy,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                index_queue::Column::ClaimedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .filter(index_queue::Column::Id.eq(id))
            .filter(index_queue::Column::ClaimedBy.eq(worker_id))
            .exec(self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

//! IndexQueue entity model
//!
//! One row per URL queued for submission to the search indexing API. `url` is
//! unique and is the conflict key for every upsert. A row reaching the retry
//! budget moves to the terminal `dead` status.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "index_queue")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub url: String,

    pub location_key: String,

    /// One of `pending`, `submitted`, `failed`, `dead`
    pub status: String,

    /// Failed submission attempts since the row was last (re)queued
    pub attempts: i32,

    pub last_attempt_at: Option<DateTimeWithTimeZone>,

    /// Worker currently holding the lease on this row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> Option<QueueStatus> {
        self.status.parse().ok()
    }
}

/// Lifecycle of a queued URL
///
/// `pending -> submitted` on a 2xx, `pending|failed -> failed` on an error while
/// attempts remain, `-> dead` once the retry budget is spent. Reindexing resets any
/// state back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Submitted,
    Failed,
    Dead,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Submitted => "submitted",
            QueueStatus::Failed => "failed",
            QueueStatus::Dead => "dead",
        }
    }

    /// Statuses the worker may pick up (subject to the attempts predicate)
    pub fn selectable() -> [&'static str; 2] {
        [QueueStatus::Pending.as_str(), QueueStatus::Failed.as_str()]
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "submitted" => Ok(QueueStatus::Submitted),
            "failed" => Ok(QueueStatus::Failed),
            "dead" => Ok(QueueStatus::Dead),
            other => Err(format!("invalid queue status: {}", other)),
        }
    }
}

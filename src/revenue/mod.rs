//! # Revenue scoring engine
//!
//! Reads the precomputed `entity_revenue_stats` aggregate to decide whether a
//! listing should be hidden and to order listings by revenue. The global EPC
//! baseline is cached; the hide decision itself is recomputed on every call and
//! never persisted.

pub mod cache;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::RevenueConfig;
use crate::models::EntityRevenueStats;
use crate::models::entity_revenue_stats;

pub use cache::TtlCache;

const GLOBAL_EPC_KEY: &str = "global_epc";

/// Revenue aggregate for one listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityRevenue {
    pub entity_id: String,
    pub clicks: i64,
    pub revenue: f64,
    /// Earnings per click
    pub epc: f64,
    pub is_hidden: bool,
}

impl EntityRevenue {
    fn zero(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            ..Self::default()
        }
    }
}

impl From<entity_revenue_stats::Model> for EntityRevenue {
    fn from(model: entity_revenue_stats::Model) -> Self {
        Self {
            entity_id: model.entity_id,
            clicks: model.clicks,
            revenue: model.revenue,
            epc: model.epc,
            is_hidden: model.is_hidden,
        }
    }
}

/// Full scoring view of a listing
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueScore {
    pub stats: EntityRevenue,
    pub global_epc: f64,
    pub should_hide: bool,
}

/// Hide rule: explicitly hidden, or enough clicks to judge and an EPC below
/// `hide_threshold` of the global baseline.
pub fn hide_decision(stats: &EntityRevenue, global_epc: f64, cfg: &RevenueConfig) -> bool {
    stats.is_hidden
        || (stats.clicks > cfg.min_clicks_for_hide && stats.epc < global_epc * cfg.hide_threshold)
}

pub struct RevenueScoringEngine {
    db: DatabaseConnection,
    config: RevenueConfig,
    cache: Arc<TtlCache<&'static str, f64>>,
}

impl RevenueScoringEngine {
    pub fn new(db: DatabaseConnection, config: RevenueConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let cache = Arc::new(TtlCache::new(
            capacity,
            Duration::from_secs(config.cache_ttl_seconds),
        ));
        Self::with_cache(db, config, cache)
    }

    /// Shares an existing cache, e.g. between the HTTP state and a batch job.
    pub fn with_cache(
        db: DatabaseConnection,
        config: RevenueConfig,
        cache: Arc<TtlCache<&'static str, f64>>,
    ) -> Self {
        Self { db, config, cache }
    }

    /// Aggregate row for `entity_id`, or zeros when missing or unreadable.
    pub async fn stats(&self, entity_id: &str) -> EntityRevenue {
        match EntityRevenueStats::find_by_id(entity_id.to_string())
            .one(&self.db)
            .await
        {
            Ok(Some(model)) => model.into(),
            Ok(None) => EntityRevenue::zero(entity_id),
            Err(e) => {
                warn!(error = %e, entity_id, "revenue stats read failed");
                EntityRevenue::zero(entity_id)
            }
        }
    }

    /// Σrevenue / Σclicks across all listings, 0 when there are no clicks.
    pub async fn global_epc(&self) -> f64 {
        if let Some(cached) = self.cache.get(&GLOBAL_EPC_KEY).await {
            return cached;
        }

        match self.load_global_epc().await {
            Ok(epc) => {
                self.cache.insert(GLOBAL_EPC_KEY, epc).await;
                debug!(global_epc = epc, "refreshed global EPC");
                epc
            }
            Err(e) => {
                warn!(error = %e, "global EPC read failed");
                0.0
            }
        }
    }

    async fn load_global_epc(&self) -> Result<f64, DbErr> {
        let revenue: SimpleExpr =
            Func::sum(Expr::col(entity_revenue_stats::Column::Revenue)).into();
        // Postgres sums BIGINT to NUMERIC; summing as float keeps one decode path
        let clicks: SimpleExpr =
            Func::sum(Expr::col(entity_revenue_stats::Column::Clicks).mul(1.0_f64)).into();

        let totals: Option<(Option<f64>, Option<f64>)> = EntityRevenueStats::find()
            .select_only()
            .column_as(revenue, "revenue")
            .column_as(clicks, "clicks")
            .into_tuple()
            .one(&self.db)
            .await?;

        Ok(match totals {
            Some((Some(revenue), Some(clicks))) if clicks > 0.0 => revenue / clicks,
            _ => 0.0,
        })
    }

    pub async fn should_hide(&self, entity_id: &str) -> bool {
        let stats = self.stats(entity_id).await;
        let global_epc = self.global_epc().await;
        hide_decision(&stats, global_epc, &self.config)
    }

    pub async fn score(&self, entity_id: &str) -> RevenueScore {
        let stats = self.stats(entity_id).await;
        let global_epc = self.global_epc().await;
        let should_hide = hide_decision(&stats, global_epc, &self.config);
        RevenueScore {
            stats,
            global_epc,
            should_hide,
        }
    }

    /// Orders `items` by revenue, highest first. The sort is stable, so items
    /// with equal revenue (including unknown ones) keep their input order.
    pub async fn sort_by_revenue<T, F>(&self, mut items: Vec<T>, entity_id: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        if items.len() < 2 {
            return items;
        }

        let ids: Vec<String> = items.iter().map(|item| entity_id(item).to_string()).collect();
        let revenue: HashMap<String, f64> = match EntityRevenueStats::find()
            .filter(entity_revenue_stats::Column::EntityId.is_in(ids))
            .all(&self.db)
            .await
        {
            Ok(rows) => rows.into_iter().map(|r| (r.entity_id, r.revenue)).collect(),
            Err(e) => {
                warn!(error = %e, "revenue read failed, keeping input order");
                return items;
            }
        };

        let revenue_of = |item: &T| revenue.get(entity_id(item)).copied().unwrap_or(0.0);
        items.sort_by(|a, b| {
            revenue_of(b)
                .partial_cmp(&revenue_of(a))
                .unwrap_or(Ordering::Equal)
        });
        items
    }
}

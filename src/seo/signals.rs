//! Signal aggregator: per-location revenue statistics and profit tiers.

use std::collections::{BTreeMap, BTreeSet};

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    sea_query::{Expr, Func, SimpleExpr},
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::eligibility::{funnel_counts, window_start};
use crate::config::{AppConfig, SignalConfig};
use crate::location::canonical_key;
use crate::models::AffiliateClick;
use crate::models::affiliate_click;

/// Monetization performance bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProfitTier {
    High,
    Medium,
    Low,
    Loss,
}

/// Funnel and revenue totals for one location
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueStat {
    pub impressions: i64,
    pub clicks: i64,
    pub revenue: f64,
    pub conversion_rate: f64,
}

impl RevenueStat {
    pub fn new(impressions: i64, clicks: i64, revenue: f64) -> Self {
        let conversion_rate = if impressions > 0 && clicks > 0 {
            clicks as f64 / impressions as f64
        } else {
            0.0
        };
        Self {
            impressions,
            clicks,
            revenue,
            conversion_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSignal {
    pub location_key: String,
    pub impressions: i64,
    pub clicks: i64,
    pub revenue: f64,
    pub conversion_rate: f64,
    pub profit_tier: ProfitTier,
}

/// Assigns a profit tier. Rules are evaluated in order and the first match wins:
/// traffic without revenue is a loss before anything else is considered.
pub fn classify_profit(stat: &RevenueStat, cfg: &SignalConfig) -> ProfitTier {
    let strong_revenue = stat.revenue >= cfg.high_revenue;
    let strong_conversion = stat.conversion_rate >= cfg.high_conversion;

    if stat.impressions > 0 && stat.revenue == 0.0 {
        ProfitTier::Loss
    } else if strong_revenue && strong_conversion {
        ProfitTier::High
    } else if strong_revenue || strong_conversion {
        ProfitTier::Medium
    } else {
        ProfitTier::Low
    }
}

/// Revenue per canonical location key: Σ offer_price × commission_rate.
async fn revenue_by_location(
    db: &DatabaseConnection,
    cfg: &SignalConfig,
) -> Result<BTreeMap<String, f64>, DbErr> {
    let revenue_expr: SimpleExpr = Func::sum(
        Expr::col(affiliate_click::Column::OfferPrice)
            .mul(Expr::col(affiliate_click::Column::OfferCommissionRate)),
    )
    .into();

    let mut query = AffiliateClick::find()
        .select_only()
        .column(affiliate_click::Column::LocationKey)
        .column_as(revenue_expr, "revenue")
        .group_by(affiliate_click::Column::LocationKey);

    if let Some(days) = cfg.window_days {
        query = query.filter(affiliate_click::Column::ClickedAt.gte(window_start(days)));
    }

    let rows: Vec<(String, Option<f64>)> = query.into_tuple().all(db).await?;

    let mut revenue = BTreeMap::new();
    for (raw_key, sum) in rows {
        let key = canonical_key(&raw_key);
        if key.is_empty() {
            continue;
        }
        *revenue.entry(key).or_insert(0.0) += sum.unwrap_or(0.0);
    }
    Ok(revenue)
}

async fn load_revenue_stats(
    db: &DatabaseConnection,
    cfg: &SignalConfig,
) -> Result<BTreeMap<String, RevenueStat>, DbErr> {
    let since = cfg.window_days.map(window_start);
    let counts = funnel_counts(db, since).await?;
    let revenue = revenue_by_location(db, cfg).await?;

    let keys: BTreeSet<&String> = counts.keys().chain(revenue.keys()).collect();
    Ok(keys
        .into_iter()
        .map(|key| {
            let funnel = counts.get(key).copied().unwrap_or_default();
            let earned = revenue.get(key).copied().unwrap_or(0.0);
            (
                key.clone(),
                RevenueStat::new(funnel.impressions, funnel.clicks, earned),
            )
        })
        .collect())
}

/// Revenue statistics for every location with events or clicks in the signal
/// window. A read failure is logged and yields an empty map.
pub async fn revenue_stats(
    db: &DatabaseConnection,
    cfg: &AppConfig,
) -> BTreeMap<String, RevenueStat> {
    load_revenue_stats(db, &cfg.signals)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "revenue stats read failed");
            BTreeMap::new()
        })
}

/// Builds one signal per eligible key, zero-filling keys without statistics.
pub fn build_profit_signals(
    stats: &BTreeMap<String, RevenueStat>,
    eligible: &BTreeSet<String>,
    cfg: &SignalConfig,
) -> Vec<ProfitSignal> {
    eligible
        .iter()
        .map(|key| {
            let stat = stats.get(key).copied().unwrap_or_default();
            ProfitSignal {
                location_key: key.clone(),
                impressions: stat.impressions,
                clicks: stat.clicks,
                revenue: stat.revenue,
                conversion_rate: stat.conversion_rate,
                profit_tier: classify_profit(&stat, cfg),
            }
        })
        .collect()
}

/// Profit signals restricted to `eligible`, ordered by location key.
///
/// On a read failure no signals are produced. Zero-filling every eligible key
/// instead would classify the whole catalogue as low and demote it.
pub async fn profit_signals(
    db: &DatabaseConnection,
    cfg: &AppConfig,
    eligible: &BTreeSet<String>,
) -> Vec<ProfitSignal> {
    match load_revenue_stats(db, &cfg.signals).await {
        Ok(stats) => build_profit_signals(&stats, eligible, &cfg.signals),
        Err(e) => {
            warn!(error = %e, "profit signal read failed, producing no signals");
            Vec::new()
        }
    }
}

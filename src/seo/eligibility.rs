//! Eligibility registry: which locations have enough funnel traffic to be worth
//! SEO treatment at all.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::{AppConfig, EligibilityConfig};
use crate::location::canonical_key;
use crate::models::affiliate_event::{self, EventType};
use crate::models::AffiliateEvent;

/// Impression and click counts for one location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FunnelCounts {
    pub impressions: i64,
    /// `view_click` + `exit_click` events
    pub clicks: i64,
}

impl FunnelCounts {
    fn record(&mut self, event_type: &str, count: i64) {
        match event_type.parse::<EventType>() {
            Ok(EventType::Impression) => self.impressions += count,
            Ok(kind) if kind.is_click() => self.clicks += count,
            _ => {}
        }
    }
}

/// Whether a location's counts clear both eligibility thresholds.
pub fn is_eligible(counts: &FunnelCounts, cfg: &EligibilityConfig) -> bool {
    counts.impressions >= cfg.min_impressions && counts.clicks >= cfg.min_clicks
}

/// Start of a trailing window of `days` ending now.
pub(crate) fn window_start(days: u32) -> DateTimeWithTimeZone {
    let start: DateTime<Utc> = Utc::now() - Duration::days(i64::from(days));
    start.into()
}

/// Per-location funnel counts, keyed by canonical location key.
///
/// Raw keys that normalize to the same canonical key are merged; keys that
/// normalize to nothing are dropped.
pub(crate) async fn funnel_counts(
    db: &DatabaseConnection,
    since: Option<DateTimeWithTimeZone>,
) -> Result<BTreeMap<String, FunnelCounts>, DbErr> {
    let mut query = AffiliateEvent::find()
        .select_only()
        .column(affiliate_event::Column::LocationKey)
        .column(affiliate_event::Column::EventType)
        .column_as(Expr::col(affiliate_event::Column::Id).count(), "event_count")
        .group_by(affiliate_event::Column::LocationKey)
        .group_by(affiliate_event::Column::EventType);

    if let Some(since) = since {
        query = query.filter(affiliate_event::Column::OccurredAt.gte(since));
    }

    let rows: Vec<(String, String, i64)> = query.into_tuple().all(db).await?;

    let mut counts: BTreeMap<String, FunnelCounts> = BTreeMap::new();
    for (raw_key, event_type, count) in rows {
        let key = canonical_key(&raw_key);
        if key.is_empty() {
            continue;
        }
        counts.entry(key).or_default().record(&event_type, count);
    }

    Ok(counts)
}

/// Canonical keys of every eligible location over the eligibility window.
///
/// A read failure is logged and yields an empty set.
pub async fn eligible_locations(db: &DatabaseConnection, cfg: &AppConfig) -> BTreeSet<String> {
    let since = window_start(cfg.eligibility.window_days);

    match funnel_counts(db, Some(since)).await {
        Ok(counts) => {
            let eligible: BTreeSet<String> = counts
                .into_iter()
                .filter(|(_, c)| is_eligible(c, &cfg.eligibility))
                .map(|(key, _)| key)
                .collect();
            debug!(eligible = eligible.len(), "computed eligible locations");
            eligible
        }
        Err(e) => {
            warn!(error = %e, "eligibility read failed, treating no location as eligible");
            BTreeSet::new()
        }
    }
}

/// Eligible location keys in lexicographic order, for sitemap generation.
pub async fn indexable_slugs(db: &DatabaseConnection, cfg: &AppConfig) -> Vec<String> {
    eligible_locations(db, cfg).await.into_iter().collect()
}

//! Promotion action classifier: maps each eligible location's profit tier to an
//! action bucket.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::signals::{ProfitSignal, ProfitTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionBucket {
    Promote,
    Maintain,
    Demote,
    Freeze,
}

impl ActionBucket {
    pub fn for_tier(tier: ProfitTier) -> Self {
        match tier {
            ProfitTier::High => ActionBucket::Promote,
            ProfitTier::Medium => ActionBucket::Maintain,
            ProfitTier::Low => ActionBucket::Demote,
            ProfitTier::Loss => ActionBucket::Freeze,
        }
    }
}

/// Bucket per location for every signal whose key is also eligible. Keys that
/// are not eligible are dropped without a trace.
pub fn classify_actions(
    signals: &[ProfitSignal],
    eligible: &BTreeSet<String>,
) -> BTreeMap<String, ActionBucket> {
    signals
        .iter()
        .filter(|signal| eligible.contains(&signal.location_key))
        .map(|signal| {
            (
                signal.location_key.clone(),
                ActionBucket::for_tier(signal.profit_tier),
            )
        })
        .collect()
}

//! # Data Models
//!
//! SeaORM entities for the funnel facts, SEO control state, the indexing queue and
//! the revenue aggregate, plus the service info payload.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod affiliate_click;
pub mod affiliate_event;
pub mod city_registry;
pub mod entity_revenue_stats;
pub mod index_queue;
pub mod system_config;

pub use affiliate_click::Entity as AffiliateClick;
pub use affiliate_event::Entity as AffiliateEvent;
pub use city_registry::Entity as CityRegistry;
pub use entity_revenue_stats::Entity as EntityRevenueStats;
pub use index_queue::Entity as IndexQueue;
pub use system_config::Entity as SystemConfig;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "seo-pipeline".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

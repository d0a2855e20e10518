//! EntityRevenueStats entity model
//!
//! Precomputed click/revenue aggregate per listing, read by the revenue scoring
//! engine.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entity_revenue_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_id: String,

    pub clicks: i64,

    pub revenue: f64,

    /// Earnings per click
    pub epc: f64,

    /// Manual kill switch for a single listing
    pub is_hidden: bool,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

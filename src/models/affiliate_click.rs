//! AffiliateClick entity model
//!
//! One row per outbound click. Revenue for a click is
//! `offer_price * offer_commission_rate`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "affiliate_clicks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Listing (hotel, tour, ...) that was clicked
    pub entity_id: String,

    pub location_key: String,

    pub offer_price: f64,

    pub offer_commission_rate: f64,

    pub clicked_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn revenue(&self) -> f64 {
        self.offer_price * self.offer_commission_rate
    }
}

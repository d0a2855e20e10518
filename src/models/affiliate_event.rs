//! AffiliateEvent entity model
//!
//! Append-only funnel facts. The pipeline only ever counts these rows.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Funnel event recorded against a location
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "affiliate_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Location the event belongs to (raw, as written by the front end)
    pub location_key: String,

    /// One of `impression`, `view_click`, `exit_view`, `exit_click`
    pub event_type: String,

    pub occurred_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Funnel event kinds stored in `event_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Impression,
    ViewClick,
    ExitView,
    ExitClick,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Impression => "impression",
            EventType::ViewClick => "view_click",
            EventType::ExitView => "exit_view",
            EventType::ExitClick => "exit_click",
        }
    }

    /// Event types counted as a click in funnel aggregates
    pub fn click_types() -> [EventType; 2] {
        [EventType::ViewClick, EventType::ExitClick]
    }

    pub fn is_click(&self) -> bool {
        matches!(self, EventType::ViewClick | EventType::ExitClick)
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "impression" => Ok(EventType::Impression),
            "view_click" | "viewClick" => Ok(EventType::ViewClick),
            "exit_view" | "exitView" => Ok(EventType::ExitView),
            "exit_click" | "exitClick" => Ok(EventType::ExitClick),
            other => Err(format!("unknown affiliate event type: {}", other)),
        }
    }
}

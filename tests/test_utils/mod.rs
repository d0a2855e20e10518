//! Test utilities for database testing.
//!
//! In-memory SQLite with every migration applied, plus fixture inserters for
//! funnel events, clicks, registry rows, queue rows and revenue aggregates.

#![allow(dead_code)]

use anyhow::Result;
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use seo_pipeline::models::{
    affiliate_click, affiliate_event, city_registry, entity_revenue_stats, index_queue,
};
use seo_pipeline::repositories::SystemConfigRepository;

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The kill switch is seeded disabled, exactly as in a fresh deployment.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Same as [`setup_test_db`] with the kill switch turned on.
pub async fn setup_enabled_db() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    SystemConfigRepository::new(&db).set_seo_enabled(true).await?;
    Ok(db)
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

/// Inserts `count` funnel events of one type for a location, one hour ago.
pub async fn insert_events(
    db: &DatabaseConnection,
    location_key: &str,
    event_type: &str,
    count: usize,
) -> Result<()> {
    insert_events_at(db, location_key, event_type, count, Duration::hours(1)).await
}

/// Inserts `count` funnel events of one type, `age` in the past.
pub async fn insert_events_at(
    db: &DatabaseConnection,
    location_key: &str,
    event_type: &str,
    count: usize,
    age: Duration,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }

    let occurred_at: DateTimeWithTimeZone = (Utc::now() - age).into();
    let rows = (0..count).map(|_| affiliate_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        location_key: Set(location_key.to_string()),
        event_type: Set(event_type.to_string()),
        occurred_at: Set(occurred_at),
    });
    affiliate_event::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Funnel shorthand: impressions plus view clicks for a location.
pub async fn insert_funnel(
    db: &DatabaseConnection,
    location_key: &str,
    impressions: usize,
    clicks: usize,
) -> Result<()> {
    insert_events(db, location_key, "impression", impressions).await?;
    insert_events(db, location_key, "view_click", clicks).await
}

/// Inserts one outbound click earning `price * rate`.
pub async fn insert_click(
    db: &DatabaseConnection,
    entity_id: &str,
    location_key: &str,
    price: f64,
    rate: f64,
) -> Result<()> {
    affiliate_click::ActiveModel {
        id: Set(Uuid::new_v4()),
        entity_id: Set(entity_id.to_string()),
        location_key: Set(location_key.to_string()),
        offer_price: Set(price),
        offer_commission_rate: Set(rate),
        clicked_at: Set(now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn insert_registry(
    db: &DatabaseConnection,
    location_key: &str,
    priority: &str,
    is_frozen: bool,
) -> Result<()> {
    city_registry::ActiveModel {
        location_key: Set(location_key.to_string()),
        priority: Set(priority.to_string()),
        is_frozen: Set(is_frozen),
        created_at: Set(now()),
        updated_at: Set(now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Inserts a queue row. `age_secs` backdates `created_at` so claim order is
/// deterministic.
pub async fn insert_queue_row(
    db: &DatabaseConnection,
    url: &str,
    location_key: &str,
    status: &str,
    attempts: i32,
    age_secs: i64,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let created_at: DateTimeWithTimeZone = (Utc::now() - Duration::seconds(age_secs)).into();
    index_queue::ActiveModel {
        id: Set(id),
        url: Set(url.to_string()),
        location_key: Set(location_key.to_string()),
        status: Set(status.to_string()),
        attempts: Set(attempts),
        last_attempt_at: Set(None),
        claimed_by: Set(None),
        claimed_at: Set(None),
        created_at: Set(created_at),
        updated_at: Set(created_at),
    }
    .insert(db)
    .await?;
    Ok(id)
}

/// Inserts `count` rows of one status with generated URLs.
pub async fn insert_queue_rows(
    db: &DatabaseConnection,
    prefix: &str,
    status: &str,
    attempts: i32,
    count: usize,
) -> Result<()> {
    for i in 0..count {
        insert_queue_row(
            db,
            &format!("http://localhost:3000/destinations/{}-{}", prefix, i),
            &format!("{}-{}", prefix, i),
            status,
            attempts,
            0,
        )
        .await?;
    }
    Ok(())
}

pub async fn insert_revenue_stats(
    db: &DatabaseConnection,
    entity_id: &str,
    clicks: i64,
    revenue: f64,
    is_hidden: bool,
) -> Result<()> {
    let epc = if clicks > 0 { revenue / clicks as f64 } else { 0.0 };
    entity_revenue_stats::ActiveModel {
        entity_id: Set(entity_id.to_string()),
        clicks: Set(clicks),
        revenue: Set(revenue),
        epc: Set(epc),
        is_hidden: Set(is_hidden),
        updated_at: Set(now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn queue_row(db: &DatabaseConnection, id: Uuid) -> Result<index_queue::Model> {
    index_queue::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("queue row {} missing", id))
}

pub async fn queue_rows(db: &DatabaseConnection) -> Result<Vec<index_queue::Model>> {
    Ok(index_queue::Entity::find().all(db).await?)
}

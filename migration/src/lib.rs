//! Database migrations for the SEO pipeline.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_10_000001_create_affiliate_events;
mod m2026_01_10_000002_create_affiliate_clicks;
mod m2026_01_10_000003_create_city_registry;
mod m2026_01_10_000004_create_index_queue;
mod m2026_01_10_000005_create_system_config;
mod m2026_01_10_000006_create_entity_revenue_stats;
mod m2026_01_12_000100_add_index_queue_lease;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_10_000001_create_affiliate_events::Migration),
            Box::new(m2026_01_10_000002_create_affiliate_clicks::Migration),
            Box::new(m2026_01_10_000003_create_city_registry::Migration),
            Box::new(m2026_01_10_000004_create_index_queue::Migration),
            Box::new(m2026_01_10_000005_create_system_config::Migration),
            Box::new(m2026_01_10_000006_create_entity_revenue_stats::Migration),
            Box::new(m2026_01_12_000100_add_index_queue_lease::Migration),
        ]
    }
}

//! Migration to create the affiliate_events table.
//!
//! Append-only funnel facts (impressions, view clicks, exit views, exit clicks)
//! keyed by location. Rows are only ever counted, never updated.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AffiliateEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AffiliateEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AffiliateEvents::LocationKey).text().not_null())
                    .col(ColumnDef::new(AffiliateEvents::EventType).text().not_null())
                    .col(
                        ColumnDef::new(AffiliateEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Trailing-window funnel aggregation scans by time, then groups by location
        manager
            .create_index(
                Index::create()
                    .name("idx_affiliate_events_occurred_location")
                    .table(AffiliateEvents::Table)
                    .col(AffiliateEvents::OccurredAt)
                    .col(AffiliateEvents::LocationKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_affiliate_events_occurred_location")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AffiliateEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AffiliateEvents {
    Table,
    Id,
    LocationKey,
    EventType,
    OccurredAt,
}

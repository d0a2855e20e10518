//! Migration to create the entity_revenue_stats table.
//!
//! Precomputed per-listing click/revenue aggregate consumed by the revenue
//! scoring engine. The periodic job that fills it lives outside this service.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EntityRevenueStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EntityRevenueStats::EntityId)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EntityRevenueStats::Clicks)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EntityRevenueStats::Revenue)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(EntityRevenueStats::Epc)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(EntityRevenueStats::IsHidden)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EntityRevenueStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntityRevenueStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EntityRevenueStats {
    Table,
    EntityId,
    Clicks,
    Revenue,
    Epc,
    IsHidden,
    UpdatedAt,
}

//! Migration to create the city_registry table.
//!
//! One row per location under SEO control. Rows are created lazily by the plan
//! applier and updated in place; they are never deleted.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CityRegistry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CityRegistry::LocationKey)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CityRegistry::Priority)
                            .text()
                            .not_null()
                            .default("normal"),
                    )
                    .col(
                        ColumnDef::new(CityRegistry::IsFrozen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CityRegistry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CityRegistry::UpdatedAt)
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
            .drop_table(Table::drop().table(CityRegistry::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CityRegistry {
    Table,
    LocationKey,
    Priority,
    IsFrozen,
    CreatedAt,
    UpdatedAt,
}

//! Migration to create the index_queue table.
//!
//! Each row is one URL awaiting (or having completed) submission to the search
//! indexing API. `url` is the upsert conflict key.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IndexQueue::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IndexQueue::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(IndexQueue::Url).text().not_null().unique_key())
                    .col(ColumnDef::new(IndexQueue::LocationKey).text().not_null())
                    .col(
                        ColumnDef::new(IndexQueue::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(IndexQueue::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(IndexQueue::LastAttemptAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IndexQueue::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(IndexQueue::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Worker selection: status + attempts predicate, oldest first
        manager
            .create_index(
                Index::create()
                    .name("idx_index_queue_status_attempts_created")
                    .table(IndexQueue::Table)
                    .col(IndexQueue::Status)
                    .col(IndexQueue::Attempts)
                    .col(IndexQueue::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_index_queue_location_key")
                    .table(IndexQueue::Table)
                    .col(IndexQueue::LocationKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_index_queue_status_attempts_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_index_queue_location_key").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(IndexQueue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IndexQueue {
    Table,
    Id,
    Url,
    LocationKey,
    Status,
    Attempts,
    LastAttemptAt,
    CreatedAt,
    UpdatedAt,
}

//! Adds claim/lease columns to index_queue so concurrent workers never submit the
//! same row twice while a lease is live.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite only accepts one column per ALTER TABLE
        manager
            .alter_table(
                Table::alter()
                    .table(IndexQueue::Table)
                    .add_column(ColumnDef::new(IndexQueue::ClaimedBy).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(IndexQueue::Table)
                    .add_column(
                        ColumnDef::new(IndexQueue::ClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(IndexQueue::Table)
                    .drop_column(IndexQueue::ClaimedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(IndexQueue::Table)
                    .drop_column(IndexQueue::ClaimedBy)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum IndexQueue {
    Table,
    ClaimedBy,
    ClaimedAt,
}

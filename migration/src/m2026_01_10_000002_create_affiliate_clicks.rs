//! Migration to create the affiliate_clicks table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AffiliateClicks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AffiliateClicks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AffiliateClicks::EntityId).text().not_null())
                    .col(ColumnDef::new(AffiliateClicks::LocationKey).text().not_null())
                    .col(
                        ColumnDef::new(AffiliateClicks::OfferPrice)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(AffiliateClicks::OfferCommissionRate)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(AffiliateClicks::ClickedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_affiliate_clicks_location_clicked")
                    .table(AffiliateClicks::Table)
                    .col(AffiliateClicks::LocationKey)
                    .col(AffiliateClicks::ClickedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_affiliate_clicks_location_clicked")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AffiliateClicks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AffiliateClicks {
    Table,
    Id,
    EntityId,
    LocationKey,
    OfferPrice,
    OfferCommissionRate,
    ClickedAt,
}

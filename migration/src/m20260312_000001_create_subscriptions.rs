//! Migration to create the subscriptions table
//!
//! Mirror of the on-chain subscription state, refreshed by a background job.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(pk_auto(Subscriptions::Id))
                    .col(string(Subscriptions::UserId).not_null())
                    .col(string(Subscriptions::Wallet).not_null())
                    .col(integer(Subscriptions::Chain).not_null())
                    .col(timestamp_with_time_zone_null(Subscriptions::ValidUntil))
                    .col(timestamp_with_time_zone(Subscriptions::RefreshedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_user_chain")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::UserId)
                    .col(Subscriptions::Chain)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    Id,
    UserId,
    Wallet,
    Chain,
    ValidUntil,
    RefreshedAt,
}

//! Migration to create profiles and api_keys
//!
//! A profile stores the caller's third-party credentials (NFT API key,
//! bundler policy id, submit pacing delay); api_keys maps an opaque key to
//! the owning profile.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(string(Profiles::UserId).primary_key())
                    .col(string_null(Profiles::AlchemyKey))
                    .col(string_null(Profiles::BundlerPolicyId))
                    .col(big_integer(Profiles::SubmitDelayMs).default(0))
                    .col(timestamp_with_time_zone(Profiles::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApiKeys::Table)
                    .if_not_exists()
                    .col(string(ApiKeys::Key).primary_key())
                    .col(string(ApiKeys::UserId).not_null())
                    .col(timestamp_with_time_zone(ApiKeys::CreatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_api_keys_user")
                    .table(ApiKeys::Table)
                    .col(ApiKeys::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    UserId,
    AlchemyKey,
    BundlerPolicyId,
    SubmitDelayMs,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Key,
    UserId,
    CreatedAt,
}

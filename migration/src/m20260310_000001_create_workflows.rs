//! Migration to create the workflows registry table
//!
//! Workflows are created by the admin UI and read-only here: contract ABI,
//! per-kind contract addresses and the selected chain.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Workflows::Table)
                    .if_not_exists()
                    .col(pk_auto(Workflows::Id))
                    .col(string(Workflows::Url).not_null())
                    .col(string(Workflows::UserId).not_null())
                    .col(string_null(Workflows::Project))
                    .col(string_null(Workflows::Object))
                    .col(text(Workflows::Abi).not_null())
                    .col(integer(Workflows::SelectedChain).not_null())
                    .col(integer(Workflows::SelectedBlockchainKind).not_null())
                    .col(string_null(Workflows::TestnetAddress))
                    .col(string_null(Workflows::MainnetAddress))
                    .col(timestamp_with_time_zone(Workflows::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Workflows::ModifiedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Lookups resolve a workflow by its url slug
        manager
            .create_index(
                Index::create()
                    .name("idx_workflows_url")
                    .table(Workflows::Table)
                    .col(Workflows::Url)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflows_user")
                    .table(Workflows::Table)
                    .col(Workflows::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Workflows::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Workflows {
    Table,
    Id,
    Url,
    UserId,
    Project,
    Object,
    Abi,
    SelectedChain,
    SelectedBlockchainKind,
    TestnetAddress,
    MainnetAddress,
    CreatedAt,
    ModifiedAt,
}

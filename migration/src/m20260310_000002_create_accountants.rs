//! Migration to create the accountants table
//!
//! An accountant binds a workflow contract to invoice-automation configuration:
//! process fee, send-email tasks and the address-book reference.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accountants::Table)
                    .if_not_exists()
                    .col(string(Accountants::Id).primary_key())
                    .col(string(Accountants::UserId).not_null())
                    .col(string_null(Accountants::Name))
                    .col(string_null(Accountants::Contract))
                    .col(string_null(Accountants::Workflow))
                    .col(boolean(Accountants::IsDeployed).default(false))
                    .col(boolean(Accountants::IsActive).default(false))
                    .col(boolean(Accountants::IsPublic).default(false))
                    .col(decimal_null(Accountants::ProcessFee))
                    .col(string_null(Accountants::AddressBookUrl))
                    .col(string_null(Accountants::PublicKey))
                    .col(text_null(Accountants::Tasks))
                    .col(string_null(Accountants::ContactInfo))
                    .col(integer(Accountants::SelectedChain).default(0))
                    .col(integer(Accountants::SelectedBlockchainKind).default(0))
                    .col(timestamp_with_time_zone(Accountants::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Accountants::ModifiedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone_null(Accountants::ActivatedAt))
                    .col(timestamp_with_time_zone_null(Accountants::DeployedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_accountants_user")
                    .table(Accountants::Table)
                    .col(Accountants::UserId)
                    .to_owned(),
            )
            .await?;

        // Automation finds accountants by the contract or workflow they watch
        manager
            .create_index(
                Index::create()
                    .name("idx_accountants_contract")
                    .table(Accountants::Table)
                    .col(Accountants::Contract)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accountants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accountants {
    Table,
    Id,
    UserId,
    Name,
    Contract,
    Workflow,
    IsDeployed,
    IsActive,
    IsPublic,
    ProcessFee,
    AddressBookUrl,
    PublicKey,
    Tasks,
    ContactInfo,
    SelectedChain,
    SelectedBlockchainKind,
    CreatedAt,
    ModifiedAt,
    ActivatedAt,
    DeployedAt,
}

//! Migration to create the invoices table
//!
//! One row per on-chain receipt, keyed (contract, receipt). Rows progress
//! ingested -> processed -> automated; errors land in the error column and do
//! not block reprocessing.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(pk_auto(Invoices::Id))
                    .col(string(Invoices::Contract).not_null())
                    .col(string(Invoices::Receipt).not_null())
                    .col(string_null(Invoices::FromAccount))
                    .col(string_null(Invoices::ToAccount))
                    .col(string_null(Invoices::Article))
                    .col(string_null(Invoices::AmountString))
                    .col(string_null(Invoices::Currency))
                    .col(boolean(Invoices::IsFiat).default(false))
                    .col(big_integer_null(Invoices::InvoiceNr))
                    .col(decimal_null(Invoices::ProcessFee))
                    .col(string_null(Invoices::AlternativeCurrency))
                    .col(string_null(Invoices::AlternativeFxValue))
                    .col(text_null(Invoices::Error))
                    .col(timestamp_with_time_zone(Invoices::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Invoices::ModifiedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone_null(Invoices::ProcessedAt))
                    .col(timestamp_with_time_zone_null(Invoices::AutomationFinishedAt))
                    .to_owned(),
            )
            .await?;

        // Upserts are keyed by (contract, receipt)
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_contract_receipt")
                    .table(Invoices::Table)
                    .col(Invoices::Contract)
                    .col(Invoices::Receipt)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    Contract,
    Receipt,
    FromAccount,
    ToAccount,
    Article,
    AmountString,
    Currency,
    IsFiat,
    InvoiceNr,
    ProcessFee,
    AlternativeCurrency,
    AlternativeFxValue,
    Error,
    CreatedAt,
    ModifiedAt,
    ProcessedAt,
    AutomationFinishedAt,
}

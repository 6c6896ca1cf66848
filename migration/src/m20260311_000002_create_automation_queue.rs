//! Migration to create the automation queue
//!
//! Database-backed work queue for invoice automation. Messages carry the
//! "contract:receipt" key and are delivered at least once; repeated failures
//! poison the message.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AutomationQueue::Table)
                    .if_not_exists()
                    .col(pk_auto(AutomationQueue::Id))
                    .col(string(AutomationQueue::Message).not_null())
                    .col(string(AutomationQueue::Status).default("pending"))
                    .col(integer(AutomationQueue::Attempts).default(0))
                    .col(text_null(AutomationQueue::LastError))
                    .col(timestamp_with_time_zone(AutomationQueue::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(AutomationQueue::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_automation_queue_status")
                    .table(AutomationQueue::Table)
                    .col(AutomationQueue::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AutomationQueue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AutomationQueue {
    Table,
    Id,
    Message,
    Status,
    Attempts,
    LastError,
    CreatedAt,
    UpdatedAt,
}

//! Automation queue worker
//!
//! Polls the automation_queue table for pending messages and runs the
//! invoice automation flow for each. Delivery is at-least-once: a failed
//! message goes back to pending with its attempt count bumped, and moves
//! to poison after the retry budget is spent. Claims orphaned by a crashed
//! worker are released back to pending after a visibility timeout.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect,
};
use tokio::time::{interval, Duration};

use crate::entities::{automation_queue, prelude::*};
use crate::services::automation::AutomationService;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const BATCH_SIZE: u64 = 10;
const MAX_ATTEMPTS: i32 = 5;
/// How long a claim may sit in processing before it is considered orphaned.
const STALE_CLAIM_SECS: i64 = 600;

pub async fn start_automation_worker(db: DatabaseConnection, automation: Arc<AutomationService>) {
    tokio::spawn(async move {
        let mut interval = interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = drain_pending(&db, &automation).await {
                tracing::error!("Automation queue poll failed: {}", e);
            }
        }
    });
}

async fn drain_pending(
    db: &DatabaseConnection,
    automation: &AutomationService,
) -> Result<(), sea_orm::DbErr> {
    let released = release_stale_claims(db).await?;
    if released > 0 {
        tracing::warn!(released, "Released stale processing claims back to pending");
    }

    let pending = AutomationQueue::find()
        .filter(automation_queue::Column::Status.eq("pending"))
        .order_by_asc(automation_queue::Column::Id)
        .limit(BATCH_SIZE)
        .all(db)
        .await?;

    for row in pending {
        process_row(db, automation, row).await?;
    }
    Ok(())
}

/// Rows stuck in processing past the visibility timeout were claimed by a
/// worker that died before finishing. Moving them back to pending keeps
/// delivery at-least-once; their attempt count is already bumped, so a
/// repeatedly crashing message still ends up poison.
async fn release_stale_claims(db: &DatabaseConnection) -> Result<u64, sea_orm::DbErr> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let cutoff = now - chrono::Duration::seconds(STALE_CLAIM_SECS);
    let result = AutomationQueue::update_many()
        .col_expr(automation_queue::Column::Status, Expr::value("pending"))
        .col_expr(automation_queue::Column::UpdatedAt, Expr::value(now))
        .filter(automation_queue::Column::Status.eq("processing"))
        .filter(automation_queue::Column::UpdatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

async fn process_row(
    db: &DatabaseConnection,
    automation: &AutomationService,
    row: automation_queue::Model,
) -> Result<(), sea_orm::DbErr> {
    let message = row.message.clone();
    let attempts = row.attempts + 1;

    let mut claimed = row.into_active_model();
    claimed.status = Set("processing".to_string());
    claimed.attempts = Set(attempts);
    claimed.updated_at = Set(Utc::now().into());
    let claimed = claimed.update(db).await?;

    match automation.process_message(&message).await {
        Ok(()) => {
            tracing::info!(message = %message, "Automation message handled");
            let mut done = claimed.into_active_model();
            done.status = Set("done".to_string());
            done.updated_at = Set(Utc::now().into());
            done.update(db).await?;
        }
        Err(err) => {
            let status = if attempts >= MAX_ATTEMPTS {
                tracing::error!(
                    message = %message,
                    attempts,
                    "Automation message moved to poison"
                );
                "poison"
            } else {
                "pending"
            };
            let mut failed = claimed.into_active_model();
            failed.status = Set(status.to_string());
            failed.last_error = Set(Some(err.to_string()));
            failed.updated_at = Set(Utc::now().into());
            failed.update(db).await?;
        }
    }
    Ok(())
}

//! Receipt-event ingestion
//!
//! Stores each receipt event as an invoice row keyed (contract, receipt)
//! and enqueues an automation message for it. The batch keeps going past
//! individual failures: zero failures succeed, a single failure is
//! propagated as-is and multiple failures are folded into one aggregate
//! error so no event's failure can hide another's.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use crate::entities::{automation_queue, invoices, prelude::*};
use crate::error::ApiError;
use crate::models::invoice::{is_fiat_currency, queue_key, ReceiptEvent};
use crate::models::sanitize;

/// Storage seam for ingestion; the database-backed store is the production
/// implementation.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Inserts or merges the invoice row for this event, last-writer-wins.
    async fn upsert_receipt(&self, event: &ReceiptEvent) -> Result<(), ApiError>;

    /// Enqueues an automation message.
    async fn enqueue(&self, message: &str) -> Result<(), ApiError>;
}

pub struct DbInvoiceStore {
    db: DatabaseConnection,
}

impl DbInvoiceStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InvoiceStore for DbInvoiceStore {
    async fn upsert_receipt(&self, event: &ReceiptEvent) -> Result<(), ApiError> {
        let contract = sanitize(&event.contract);
        let receipt = sanitize(&event.id);
        let is_fiat = event
            .currency
            .as_deref()
            .map(is_fiat_currency)
            .unwrap_or(false);
        // An unparseable amount is recorded on the row, not fatal to it.
        let amount_error = event.amount.as_deref().and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.parse::<rust_decimal::Decimal>().is_ok() {
                None
            } else {
                Some("Cannot parse number from Amount".to_string())
            }
        });
        let now = Utc::now().into();

        let existing = Invoices::find()
            .filter(invoices::Column::Contract.eq(&contract))
            .filter(invoices::Column::Receipt.eq(&receipt))
            .one(&self.db)
            .await?;

        let mut row = match existing {
            Some(model) => invoices::ActiveModel::from(model),
            None => invoices::ActiveModel {
                contract: Set(contract),
                receipt: Set(receipt),
                created_at: Set(now),
                ..Default::default()
            },
        };
        row.from_account = Set(event.from.clone());
        row.to_account = Set(event.to.clone());
        row.article = Set(event.article.clone());
        row.amount_string = Set(event.amount.clone());
        row.currency = Set(event.currency.clone());
        row.is_fiat = Set(is_fiat);
        row.error = Set(amount_error);
        row.modified_at = Set(now);
        row.save(&self.db).await?;
        Ok(())
    }

    async fn enqueue(&self, message: &str) -> Result<(), ApiError> {
        let now = Utc::now().into();
        automation_queue::ActiveModel {
            message: Set(message.to_string()),
            status: Set("pending".to_string()),
            attempts: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}

/// Ingests a batch of receipt events, returning how many were stored.
pub async fn ingest_events(
    store: &dyn InvoiceStore,
    events: &[ReceiptEvent],
) -> Result<usize, ApiError> {
    let mut stored = 0;
    let mut failures: Vec<ApiError> = Vec::new();

    for event in events {
        match ingest_one(store, event).await {
            Ok(()) => stored += 1,
            Err(err) => {
                tracing::error!(
                    contract = %event.contract,
                    receipt = %event.id,
                    error = %err,
                    "Failed to store receipt event"
                );
                failures.push(err);
            }
        }
    }

    match failures.len() {
        0 => Ok(stored),
        1 => Err(failures.remove(0)),
        n => {
            let messages: Vec<String> = failures.iter().map(|err| err.to_string()).collect();
            Err(ApiError::Validation(format!(
                "{} of {} receipt events failed: {}",
                n,
                events.len(),
                messages.join("; ")
            )))
        }
    }
}

async fn ingest_one(store: &dyn InvoiceStore, event: &ReceiptEvent) -> Result<(), ApiError> {
    if event.id.trim().is_empty() {
        return Err(ApiError::Validation("receipt event has no id".into()));
    }
    if event.contract.trim().is_empty() {
        return Err(ApiError::Validation(format!(
            "receipt event {} has no contract",
            event.id
        )));
    }
    store.upsert_receipt(event).await?;
    store.enqueue(&queue_key(&event.contract, &event.id)).await
}

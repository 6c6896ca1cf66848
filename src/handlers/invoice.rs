//! Invoice ingestion, listing and reprocessing

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::{accountants, invoices, prelude::*};
use crate::error::ApiError;
use crate::models::invoice::{InvoiceResponse, ReceiptEvent};
use crate::services::{automation, ingest};
use crate::AppState;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEventsResponse {
    pub message: String,
    pub stored: usize,
}

/// Batch ingestion of receipt events. Mirrors at-least-once delivery: the
/// whole batch is retried by the producer when this fails.
pub async fn store_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<ReceiptEvent>>,
) -> Result<Json<StoreEventsResponse>, ApiError> {
    tracing::info!(events = events.len(), "Ingesting receipt events");
    let stored = ingest::ingest_events(state.store.as_ref(), &events).await?;
    Ok(Json(StoreEventsResponse {
        message: "OK".to_string(),
        stored,
    }))
}

/// Invoices for a contract the caller's accountant watches.
pub async fn list_invoices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contract): Path<String>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let user = require_user(&state, &headers).await?;
    owned_accountant_for(&state, &user, &contract).await?;

    let rows = Invoices::find()
        .filter(invoices::Column::Contract.eq(&contract))
        .order_by_desc(invoices::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Re-enqueues automation for one invoice, regardless of any prior error.
/// Fails up front when the caller's accountant is inactive.
pub async fn reprocess_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((contract, receipt)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers).await?;
    let accountant = owned_accountant_for(&state, &user, &contract).await?;
    automation::reprocess(state.store.as_ref(), &accountant, &contract, &receipt).await?;
    Ok(Json(serde_json::json!({ "message": "OK" })))
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    state
        .auth
        .get_user(headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))
}

async fn owned_accountant_for(
    state: &AppState,
    user: &str,
    contract: &str,
) -> Result<accountants::Model, ApiError> {
    Accountants::find()
        .filter(accountants::Column::UserId.eq(user))
        .filter(accountants::Column::Contract.eq(contract))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no accountant watches contract {}", contract))
        })
}

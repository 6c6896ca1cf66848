//! Subscription status endpoint

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::entities::{prelude::*, subscriptions};
use crate::error::ApiError;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub chain: i32,
    pub wallet: String,
    pub valid_until: Option<String>,
    pub refreshed_at: String,
}

/// Cached on-chain subscription state for the caller, per chain.
pub async fn get_subscriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let user = state
        .auth
        .get_user(&headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))?;

    let rows = Subscriptions::find()
        .filter(subscriptions::Column::UserId.eq(&user))
        .all(&state.db)
        .await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| SubscriptionResponse {
                chain: row.chain,
                wallet: row.wallet,
                valid_until: row.valid_until.map(|dt| dt.to_rfc3339()),
                refreshed_at: row.refreshed_at.to_rfc3339(),
            })
            .collect(),
    ))
}

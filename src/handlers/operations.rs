//! Build and submit endpoints for user operations
//!
//! Both endpoints answer 200 with a partial-success envelope; callers must
//! inspect `failedOperations` in the body. Only auth and configuration
//! failures surface as HTTP errors.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::models::operation::{
    BuildOperationsRequest, OperationsResponse, SubmitOperationsRequest,
};
use crate::services::builder::{DbWorkflowSource, OperationBuilder};
use crate::services::profile;
use crate::services::submitter::OperationSubmitter;
use crate::AppState;

pub async fn build_operations(
    State(state): State<AppState>,
    Json(payload): Json<BuildOperationsRequest>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let profile = profile::resolve_api_key(&state.db, &payload.api_key).await?;
    tracing::info!(
        user = %profile.user_id,
        operations = payload.operations.len(),
        "Building user operations"
    );

    let builder = OperationBuilder::new(
        Arc::new(DbWorkflowSource::new(state.db.clone())),
        state.bundler.clone(),
        state.settings.signer.clone(),
        state.settings.entry_point,
        state.settings.chain_id,
        profile.bundler_policy_id.clone(),
        submit_delay(profile.submit_delay_ms),
    );
    let contexts = builder.build_operations(payload.operations).await;
    Ok(Json(OperationsResponse::from_contexts(contexts)))
}

pub async fn submit_operations(
    State(state): State<AppState>,
    Json(payload): Json<SubmitOperationsRequest>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let profile = profile::resolve_api_key(&state.db, &payload.api_key).await?;
    tracing::info!(
        user = %profile.user_id,
        operations = payload.operations.len(),
        "Submitting user operations"
    );

    let mut contexts = payload.operations;
    if let Some(signature) = payload.signature {
        for ctx in &mut contexts {
            if let Some(op) = ctx.user_op.as_mut() {
                op.signature = signature.clone();
            }
        }
    }

    let submitter = OperationSubmitter::new(
        state.bundler.clone(),
        state.settings.signer.clone(),
        state.settings.chain_id,
        submit_delay(profile.submit_delay_ms),
    );
    let contexts = submitter.submit_operations(contexts).await;
    Ok(Json(OperationsResponse::from_contexts(contexts)))
}

fn submit_delay(millis: i64) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}

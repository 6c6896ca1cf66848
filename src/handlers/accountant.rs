//! Accountant CRUD and key management

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, TryIntoModel,
};
use uuid::Uuid;

use crate::entities::{accountants, prelude::*};
use crate::error::ApiError;
use crate::models::accountant::{
    logo_blob_name, vault_secret_name, AccountantResponse, UpsertAccountantRequest,
};
use crate::services::blobs::LOGO_CONTAINER;
use crate::AppState;

/// The caller's own accountants plus everyone's public, deployed ones.
/// Anonymous callers only see the public set.
pub async fn list_accountants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccountantResponse>>, ApiError> {
    let user = state.auth.get_user(&headers, false).await?;

    let public = Condition::all()
        .add(accountants::Column::IsPublic.eq(true))
        .add(accountants::Column::IsDeployed.eq(true));
    let filter = match &user {
        Some(user_id) => Condition::any()
            .add(accountants::Column::UserId.eq(user_id))
            .add(public),
        None => Condition::any().add(public),
    };

    let rows = Accountants::find().filter(filter).all(&state.db).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn get_accountant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AccountantResponse>, ApiError> {
    let user = state.auth.get_user(&headers, false).await?;
    let row = Accountants::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no accountant with id {}", id)))?;

    let visible = row.is_public || user.as_deref() == Some(row.user_id.as_str());
    if !visible {
        return Err(ApiError::NotFound(format!("no accountant with id {}", id)));
    }
    Ok(Json(row.into()))
}

pub async fn upsert_accountant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpsertAccountantRequest>,
) -> Result<Json<AccountantResponse>, ApiError> {
    let user = state
        .auth
        .get_user(&headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))?;

    let existing = Accountants::find_by_id(&payload.id).one(&state.db).await?;
    if let Some(existing) = &existing {
        if existing.user_id != user {
            return Err(ApiError::Validation("Accountant already exists".into()));
        }
    }

    let tasks_json = serde_json::to_string(&payload.tasks)
        .map_err(|err| ApiError::Validation(format!("tasks are not serializable: {}", err)))?;
    let now = Utc::now().into();

    let mut row = match existing {
        Some(model) => model.into_active_model(),
        None => accountants::ActiveModel {
            id: Set(payload.id.clone()),
            user_id: Set(user.clone()),
            created_at: Set(now),
            ..Default::default()
        },
    };
    row.name = Set(payload.name);
    row.contract = Set(payload.contract);
    row.workflow = Set(payload.workflow);
    row.is_deployed = Set(payload.is_deployed);
    row.is_active = Set(payload.is_active);
    row.is_public = Set(payload.is_public);
    row.process_fee = Set(payload.process_fee);
    row.address_book_url = Set(payload.address_book_url);
    row.contact_info = Set(payload.contact_info);
    row.tasks = Set(Some(tasks_json));
    row.selected_chain = Set(payload.selected_chain);
    row.selected_blockchain_kind = Set(payload.selected_blockchain_kind);
    row.modified_at = Set(now);
    if payload.is_active {
        row.activated_at = Set(Some(now));
    }
    if payload.is_deployed {
        row.deployed_at = Set(Some(now));
    }

    let saved = row.save(&state.db).await?;
    let model = saved
        .try_into_model()
        .map_err(|err| ApiError::Database(err.to_string()))?;
    Ok(Json(model.into()))
}

pub async fn delete_accountant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .auth
        .get_user(&headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))?;

    let row = Accountants::find_by_id(&id)
        .one(&state.db)
        .await?
        .filter(|row| row.user_id == user)
        .ok_or_else(|| ApiError::NotFound(format!("no accountant with id {}", id)))?;
    row.delete(&state.db).await?;
    Ok(Json(serde_json::json!({ "message": "OK" })))
}

/// Creates a fresh signing key for the accountant, stores the private half
/// in the vault and the public address on the row.
pub async fn generate_public_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AccountantResponse>, ApiError> {
    let user = state
        .auth
        .get_user(&headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))?;

    let row = Accountants::find_by_id(&id)
        .one(&state.db)
        .await?
        .filter(|row| row.user_id == user)
        .ok_or_else(|| ApiError::NotFound(format!("no accountant with id {}", id)))?;

    let signer = alloy::signers::local::PrivateKeySigner::random();
    let address = signer.address();
    let secret = hex::encode(signer.to_bytes());
    state
        .vault
        .set_secret(&vault_secret_name(&row.id), &secret)
        .await?;

    let mut update = row.into_active_model();
    update.public_key = Set(Some(format!("{:#x}", address)));
    update.modified_at = Set(Utc::now().into());
    let model = update.update(&state.db).await?;
    Ok(Json(model.into()))
}

/// Uploads the accountant's logo to the public blob container and returns
/// the URL it is served from. Owner-scoped like delete; expects a multipart
/// body with exactly one file part.
pub async fn upload_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .auth
        .get_user(&headers, true)
        .await?
        .ok_or_else(|| ApiError::Auth("missing bearer token".into()))?;

    let row = Accountants::find_by_id(&id)
        .one(&state.db)
        .await?
        .filter(|row| row.user_id == user)
        .ok_or_else(|| ApiError::NotFound(format!("no accountant with id {}", id)))?;

    let field = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("bad multipart payload: {}", err)))?
        .ok_or_else(|| ApiError::Validation("logo upload needs exactly one file part".into()))?;
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Validation("logo file part has no filename".into()))?;
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|err| ApiError::Validation(format!("bad multipart payload: {}", err)))?;
    let more = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("bad multipart payload: {}", err)))?;
    if more.is_some() {
        return Err(ApiError::Validation(
            "logo upload needs exactly one file part".into(),
        ));
    }

    let unique = Uuid::new_v4().simple().to_string();
    let name = logo_blob_name(&row.id, &unique[..8], &filename);
    let url = state
        .blobs
        .upload(LOGO_CONTAINER, &name, &content_type, bytes.to_vec())
        .await?;
    Ok(Json(serde_json::json!({ "cid": url })))
}

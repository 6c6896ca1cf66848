//! NFT ownership and workflow-item metadata endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::nft::{NftMetadataResponse, OwnedNft};
use crate::services::{nft, profile, registry};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNftsQuery {
    pub api_key: String,
    pub address: String,
}

pub async fn owned_nfts(
    State(state): State<AppState>,
    Query(query): Query<OwnedNftsQuery>,
) -> Result<Json<Vec<OwnedNft>>, ApiError> {
    let caller = profile::resolve_api_key(&state.db, &query.api_key).await?;
    let api_key = profile::alchemy_key(&caller)?;
    let nfts = state.nft.owned_nfts(api_key, &query.address).await?;
    Ok(Json(nfts))
}

/// Public metadata endpoint for one workflow item, shaped like standard
/// token metadata (name/description/image).
pub async fn item_metadata(
    State(state): State<AppState>,
    Path((workflow_url, id)): Path<(String, u64)>,
) -> Result<Json<NftMetadataResponse>, ApiError> {
    let workflow = registry::find_by_url(&state.db, &workflow_url, None).await?;
    let resolved = registry::resolve_evm(workflow)?;
    let metadata = nft::item_metadata(&resolved, id).await?;
    Ok(Json(metadata))
}

//! API-key to profile resolution
//!
//! Profiles carry the caller's stored third-party credentials: the NFT
//! provider key, the bundler paymaster policy and the submit pacing delay.

use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entities::{prelude::*, profiles};
use crate::error::ApiError;

/// Resolves an opaque API key to the owning profile. A key without a profile
/// row behind it is treated as missing configuration, not an auth failure.
pub async fn resolve_api_key(
    db: &DatabaseConnection,
    api_key: &str,
) -> Result<profiles::Model, ApiError> {
    let key_row = ApiKeys::find_by_id(api_key.to_string())
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Auth("invalid API key".into()))?;

    Profiles::find_by_id(key_row.user_id.clone())
        .one(db)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no profile configured for user {}", key_row.user_id))
        })
}

/// Third-party NFT API key stored on the profile, required for NFT queries.
pub fn alchemy_key(profile: &profiles::Model) -> Result<&str, ApiError> {
    profile
        .alchemy_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::NotFound("profile has no NFT API key configured".into()))
}

//! Secret storage client
//!
//! Accountant signing keys never live in the database; they are stored in
//! the external vault under a name derived from the accountant id.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Clone)]
pub struct VaultService {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize, Deserialize)]
struct SecretBody {
    value: String,
}

impl VaultService {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
        }
    }

    pub async fn get_secret(&self, name: &str) -> Result<String, ApiError> {
        let url = format!("{}/secrets/{}", self.base_url, name);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("vault request failed: {}", err)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("no secret named {}", name)));
        }
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "vault returned {}",
                response.status()
            )));
        }
        let body: SecretBody = response
            .json()
            .await
            .map_err(|err| ApiError::Upstream(format!("vault decode failed: {}", err)))?;
        Ok(body.value)
    }

    pub async fn set_secret(&self, name: &str, value: &str) -> Result<(), ApiError> {
        let url = format!("{}/secrets/{}", self.base_url, name);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&SecretBody {
                value: value.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("vault request failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "vault returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

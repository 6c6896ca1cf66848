//! Public blob storage client
//!
//! Accountant logos live in an external object store with public read
//! access; the backend uploads the file and hands back its URL.

use reqwest::Client;

use crate::error::ApiError;

/// Container for uploaded accountant logos.
pub const LOGO_CONTAINER: &str = "ada-logos";

#[derive(Clone)]
pub struct BlobService {
    client: Client,
    base_url: String,
    token: String,
}

impl BlobService {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
        }
    }

    /// Uploads the blob under `{container}/{name}`, overwriting any previous
    /// version, and returns the public URL it is served from.
    pub async fn upload(
        &self,
        container: &str,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let url = format!("{}/{}/{}", self.base_url, container, name);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("blob upload failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "blob store returned {}",
                response.status()
            )));
        }
        Ok(url)
    }
}

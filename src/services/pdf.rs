//! HTML to PDF rendering client
//!
//! Rendering happens in an external service; this client posts the invoice
//! HTML and gets the PDF bytes back.

use reqwest::Client;

use crate::error::ApiError;

#[derive(Clone)]
pub struct PdfService {
    client: Client,
    render_url: String,
}

impl PdfService {
    pub fn new(render_url: String) -> Self {
        Self {
            client: Client::new(),
            render_url,
        }
    }

    pub async fn render(&self, html: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .post(&self.render_url)
            .header("content-type", "text/html")
            .body(html.to_string())
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("pdf render request failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "pdf renderer returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::Upstream(format!("pdf download failed: {}", err)))?;
        if bytes.is_empty() {
            return Err(ApiError::Upstream("pdf renderer returned no data".into()));
        }
        Ok(bytes.to_vec())
    }
}

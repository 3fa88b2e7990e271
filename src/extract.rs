//! Source-document text extraction.
//!
//! The extractor receives a fetchable URL (the upload flow stores documents in
//! object storage and hands this crate the public URL, never raw bytes) and
//! returns the full plain text. No retries happen here; retrying is the
//! orchestrator's call.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::types::GroundingError;

/// Pulls raw text out of a source document addressed by URL.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Fetches the document and returns its extracted plain text.
    ///
    /// An empty string is a valid result (a PDF with no text layer); fetch
    /// and parse failures are fatal for the document being ingested.
    async fn extract(&self, url: &str) -> Result<String, GroundingError>;
}

/// [`TextExtractor`] for PDF documents fetched over HTTP(S).
#[derive(Clone, Debug)]
pub struct PdfExtractor {
    client: Client,
}

impl PdfExtractor {
    pub fn new() -> Result<Self, GroundingError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, GroundingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GroundingError::Config(err.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, GroundingError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()
            .map_err(|err| GroundingError::Fetch(err.to_string()))?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, url: &str) -> Result<String, GroundingError> {
        let url = Url::parse(url)
            .map_err(|err| GroundingError::Fetch(format!("invalid source url '{url}': {err}")))?;

        let bytes = self.fetch_bytes(&url).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "fetched source document");

        // PDF parsing is CPU-bound; keep it off the async workers.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|err| GroundingError::Parse(format!("extraction task failed: {err}")))?
            .map_err(|err| GroundingError::Parse(err.to_string()))?;

        tracing::debug!(url = %url, chars = text.len(), "extracted text layer");
        Ok(text)
    }
}

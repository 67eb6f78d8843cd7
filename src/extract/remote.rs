//! Remote extraction-service provider.
//!
//! Posts document bytes to an Unstructured-style extraction API (hosted or
//! self-hosted) and joins the text of the returned elements. This is the
//! provider for binary formats like PDF and DOCX.

use std::time::Duration;

use async_trait::async_trait;

use super::{ExtractionError, TextExtractor};

/// Text extractor backed by an HTTP extraction service.
#[derive(Debug)]
pub struct RemoteExtractor {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteExtractor {
    /// Create a new remote extractor for the given service endpoint.
    pub fn new(api_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl TextExtractor for RemoteExtractor {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError> {
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(&mime_type)
            .map_err(|e| ExtractionError::Provider(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("files", part)
            .text("output_format", "text/plain");

        let mut request = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .multipart(form);

        if let Some(api_key) = &self.api_key {
            request = request.header("unstructured-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Provider(format!(
                "extraction service error ({status}): {error_text}"
            )));
        }

        // The service returns an array of elements; the document text is
        // the concatenation of their `text` fields.
        let elements: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ExtractionError::Provider(e.to_string()))?;

        let content = elements
            .iter()
            .filter_map(|e| e.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "Remote"
    }
}

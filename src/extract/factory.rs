//! Factory for creating text extractors based on configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ExtractionConfig;

use super::plain::PlainTextExtractor;
use super::remote::RemoteExtractor;
use super::{ExtractionError, TextExtractor};

/// Factory for creating text extractors based on configuration.
#[derive(Debug)]
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Create a text extractor from configuration.
    ///
    /// `"remote"` and `"plain"` select a provider explicitly; `"auto"`
    /// (the default) prefers the remote service when an API URL is
    /// configured and falls back to plain text otherwise.
    pub fn create(config: &ExtractionConfig) -> Result<Arc<dyn TextExtractor>, ExtractionError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        match config.provider.as_str() {
            "remote" => {
                let api_url = config.api_url.clone().ok_or_else(|| {
                    ExtractionError::Provider(
                        "remote extraction requires extraction.api_url".to_string(),
                    )
                })?;
                tracing::info!(api_url = %api_url, "Using remote extraction service");
                Ok(Arc::new(RemoteExtractor::new(
                    api_url,
                    config.api_key.clone(),
                    timeout,
                )))
            }
            "plain" => {
                tracing::info!("Using plain-text extraction (UTF-8 documents only)");
                Ok(Arc::new(PlainTextExtractor::new()))
            }
            _ => {
                if let Some(api_url) = &config.api_url {
                    tracing::info!(api_url = %api_url, "Using remote extraction service");
                    Ok(Arc::new(RemoteExtractor::new(
                        api_url.clone(),
                        config.api_key.clone(),
                        timeout,
                    )))
                } else {
                    tracing::info!("Using plain-text extraction (UTF-8 documents only)");
                    Ok(Arc::new(PlainTextExtractor::new()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(provider: &str, api_url: Option<&str>) -> ExtractionConfig {
        ExtractionConfig {
            provider: provider.to_string(),
            api_url: api_url.map(ToString::to_string),
            api_key: None,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_create_plain_provider() {
        let extractor = ExtractorFactory::create(&base_config("plain", None)).unwrap();
        assert_eq!(extractor.name(), "Plain");
    }

    #[test]
    fn test_create_remote_provider() {
        let config = base_config("remote", Some("http://localhost:8000/extract"));
        let extractor = ExtractorFactory::create(&config).unwrap();
        assert_eq!(extractor.name(), "Remote");
    }

    #[test]
    fn test_remote_without_url_is_an_error() {
        let result = ExtractorFactory::create(&base_config("remote", None));
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_prefers_remote_when_configured() {
        let config = base_config("auto", Some("http://localhost:8000/extract"));
        let extractor = ExtractorFactory::create(&config).unwrap();
        assert_eq!(extractor.name(), "Remote");
    }

    #[test]
    fn test_auto_falls_back_to_plain() {
        let extractor = ExtractorFactory::create(&base_config("auto", None)).unwrap();
        assert_eq!(extractor.name(), "Plain");
    }
}

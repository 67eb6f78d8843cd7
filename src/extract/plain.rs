//! Plain-text extraction provider.
//!
//! Fallback provider that handles UTF-8 text documents locally without any
//! external calls. Binary formats need the remote provider.

use async_trait::async_trait;

use super::{ExtractionError, TextExtractor};

/// Local extractor for documents that already are UTF-8 text.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Create a new plain-text extractor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError> {
        std::str::from_utf8(data)
            .map(ToString::to_string)
            .map_err(|e| {
                ExtractionError::Unsupported(format!(
                    "{filename} is not valid UTF-8 text ({e}): use a remote extraction provider for binary formats"
                ))
            })
    }

    fn name(&self) -> &'static str {
        "Plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_utf8_text() {
        let extractor = PlainTextExtractor::new();
        let text = extractor
            .extract(b"Hello, document!", "notes.txt")
            .await
            .unwrap();
        assert_eq!(text, "Hello, document!");
    }

    #[tokio::test]
    async fn test_rejects_invalid_utf8() {
        let extractor = PlainTextExtractor::new();
        let result = extractor.extract(&[0xFF, 0xFE, 0x00], "blob.bin").await;
        assert!(matches!(result, Err(ExtractionError::Unsupported(_))));
    }
}

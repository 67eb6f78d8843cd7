//! Document text extraction.
//!
//! The service treats "extract text from a document" as an external
//! capability behind the [`TextExtractor`] trait: bytes in, plain text out,
//! may fail. Two providers are included, a local UTF-8 pass-through for
//! plain-text documents and a remote HTTP extraction service for binary
//! formats, selected from configuration by [`ExtractorFactory`].

pub mod factory;
pub mod plain;
pub mod remote;

pub use factory::ExtractorFactory;
pub use plain::PlainTextExtractor;
pub use remote::RemoteExtractor;

use async_trait::async_trait;

/// Errors that can occur during text extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The document yielded no usable text.
    #[error("document contains no readable text")]
    NoText,

    /// The document encoding or format cannot be handled by this provider.
    #[error("unsupported document: {0}")]
    Unsupported(String),

    /// The provider is misconfigured or its API reported a failure.
    #[error("extraction provider error: {0}")]
    Provider(String),

    /// The HTTP request to a remote provider failed.
    #[error("extraction HTTP error: {0}")]
    Http(String),
}

/// Trait for document text extraction providers.
///
/// Implementors turn raw document bytes into plain text. Each provider may
/// support different formats and have different requirements (API access,
/// network, etc.).
#[async_trait]
pub trait TextExtractor: Send + Sync + std::fmt::Debug {
    /// Extract plain text from the given document bytes.
    ///
    /// `filename` is the client-supplied name, used only to infer the
    /// document's MIME type where a provider needs one.
    async fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError>;

    /// Provider name for logging and debugging.
    fn name(&self) -> &'static str;
}

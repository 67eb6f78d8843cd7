//! Text generation backend.
//!
//! The service treats "generate a reply given a prompt" as an external
//! capability behind the [`TextGenerator`] trait: prompt in, reply out, may
//! fail or be slow. The bundled implementation,
//! [`ChatCompletionsClient`], talks to any OpenAI-compatible
//! `/v1/chat/completions` endpoint without streaming; the conversation
//! core never needs token-by-token output.

pub mod chat_completions;

pub use chat_completions::ChatCompletionsClient;

use std::time::Duration;

use async_trait::async_trait;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o-mini`).
    pub model: String,
    /// Hard deadline for a single generation request.
    pub request_timeout: Duration,
}

/// Errors that can occur while generating a reply.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request to the backend failed.
    #[error("text generation request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("text generation backend returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The backend did not answer within the configured deadline.
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend's response body did not have the expected shape.
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

/// Trait for text generation backends.
///
/// Implementations take an assembled prompt and return a single complete
/// reply.
#[async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    /// Generate a reply for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, rejects the request,
    /// times out, or answers with an unusable body.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Load LLM settings from the environment.
///
/// `LLM_BASE_URL` and `LLM_MODEL` are required; `LLM_API_KEY` is optional
/// (local backends typically run unauthenticated).
pub fn load_llm_settings(request_timeout_secs: u64) -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .map_err(|_| "Missing required env var: LLM_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        request_timeout: Duration::from_secs(request_timeout_secs),
    })
}

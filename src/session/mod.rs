//! Conversation sessions and prompt assembly.
//!
//! A [`ChatSession`] binds one ingested document's text and system
//! instruction to an append-only conversation history. Every message turn
//! re-derives a grounded prompt from the stored text (truncated to a fixed
//! character window) plus the new user question; replies never draw on
//! anything outside that window.

pub mod registry;

pub use registry::SessionRegistry;

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::{ExtractionError, TextExtractor};
use crate::llm::{GenerationError, TextGenerator};

/// Maximum number of document characters included in a prompt's context.
const CONTEXT_WINDOW_CHARS: usize = 6000;

/// Marker appended to the context when the document was cut off.
const TRUNCATION_MARKER: &str = "...";

/// Instruction used when the upload carries no custom prompt.
const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an assistant that answers questions using only the content of an uploaded document.

Instructions:
1. Base every answer strictly on the document content provided below.
2. If the document does not contain the requested information, reply: \"The document does not provide that information.\"
3. Include page or section references when available, placed at the end of the answer.
4. Present answers as bullet points, numbered lists, or short structured summaries.
5. Keep responses concise and factual; do not use outside knowledge.";

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User question.
    User,
    /// Assistant reply.
    Assistant,
}

/// A single conversation message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// When the message was appended to the history.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Read-only summary of a session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Length of the extracted document text, in characters.
    pub text_length: usize,
    /// Number of messages in the conversation history.
    pub message_count: usize,
}

/// One document-grounded conversation.
///
/// The document text and system prompt are fixed at construction; only the
/// history changes, and only through [`send_message`](Self::send_message)
/// (which appends exactly one user/assistant pair per success) and
/// [`clear`](Self::clear).
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    document_text: String,
    system_prompt: String,
    history: RwLock<Vec<ChatMessage>>,
    /// Serializes message turns on this session so interleaved sends cannot
    /// interleave their history appends. Distinct sessions are unaffected.
    send_lock: tokio::sync::Mutex<()>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl ChatSession {
    fn new(id: String, document_text: String, system_prompt: String) -> Self {
        Self {
            id,
            document_text,
            system_prompt,
            history: RwLock::new(Vec::new()),
            send_lock: tokio::sync::Mutex::new(()),
            last_activity: RwLock::new(Utc::now()),
        }
    }

    /// Build a session from raw document bytes.
    ///
    /// Runs the extractor, normalizes the text's whitespace, and installs
    /// the system prompt: the caller's instruction when supplied and
    /// non-empty, the built-in default otherwise.
    ///
    /// # Errors
    ///
    /// Fails when the extractor reports an error or when the normalized
    /// text is empty; no partial session is produced.
    pub async fn initialize(
        id: String,
        extractor: &dyn TextExtractor,
        document: &[u8],
        filename: &str,
        custom_instruction: Option<&str>,
    ) -> Result<Self, ExtractionError> {
        let raw = extractor.extract(document, filename).await?;
        let document_text = normalize_whitespace(&raw);
        if document_text.is_empty() {
            return Err(ExtractionError::NoText);
        }

        let system_prompt = custom_instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string();

        Ok(Self::new(id, document_text, system_prompt))
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a user message: assemble the grounded prompt, call the
    /// generation backend, and on success append the user/assistant pair to
    /// the history.
    ///
    /// # Errors
    ///
    /// On backend failure the history is left untouched and the error is
    /// returned as-is.
    pub async fn send_message(
        &self,
        generator: &dyn TextGenerator,
        user_text: &str,
    ) -> Result<String, GenerationError> {
        let _turn = self.send_lock.lock().await;

        let prompt = self.build_prompt(user_text);
        let reply = generator.generate(&prompt).await?;

        {
            // Both messages go in under one write acquisition, so readers
            // never observe an odd-length history.
            let mut history = self.history.write().unwrap();
            history.push(ChatMessage::user(user_text));
            history.push(ChatMessage::assistant(reply.clone()));
        }
        self.touch();

        Ok(reply)
    }

    /// Assemble the generation prompt: system instruction, the document
    /// text capped at the context window, and the verbatim user question.
    fn build_prompt(&self, user_text: &str) -> String {
        let (context, truncated) = self.context_window();
        let marker = if truncated { TRUNCATION_MARKER } else { "" };
        format!(
            "{}\n\nDocument content:\n{}{}\n\nUser question: {}\n\nAnswer the user's question based on the document content above.",
            self.system_prompt, context, marker, user_text
        )
    }

    /// First `CONTEXT_WINDOW_CHARS` characters of the document text, with a
    /// flag telling whether anything was cut off.
    fn context_window(&self) -> (&str, bool) {
        match self.document_text.char_indices().nth(CONTEXT_WINDOW_CHARS) {
            Some((byte_idx, _)) => (&self.document_text[..byte_idx], true),
            None => (self.document_text.as_str(), false),
        }
    }

    /// Get a copy of the conversation history.
    #[must_use]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.read().unwrap().clone()
    }

    /// Empty the conversation history. Idempotent; the document text and
    /// system prompt are unaffected.
    pub fn clear(&self) {
        self.history.write().unwrap().clear();
        self.touch();
    }

    /// Get a read-only summary of the session.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            text_length: self.document_text.chars().count(),
            message_count: self.history.read().unwrap().len(),
        }
    }

    /// Update the last-activity timestamp.
    fn touch(&self) {
        *self.last_activity.write().unwrap() = Utc::now();
    }

    /// Whether the session has seen no activity for longer than `timeout`.
    pub(crate) fn is_idle_longer_than(&self, timeout: Duration) -> bool {
        let last = *self.last_activity.read().unwrap();
        match (Utc::now() - last).to_std() {
            Ok(idle) => idle > timeout,
            // Negative duration means clock skew; treat as active.
            Err(_) => false,
        }
    }
}

/// Normalize extracted document text: runs of spaces/tabs collapse to one
/// space, runs of newlines to one newline, and the ends are trimmed.
fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_newline = false;
    let mut pending_space = false;
    for ch in input.chars() {
        match ch {
            '\n' | '\r' => {
                pending_newline = true;
                pending_space = false;
            }
            ' ' | '\t' => {
                if !pending_newline {
                    pending_space = true;
                }
            }
            _ => {
                if pending_newline {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    pending_newline = false;
                } else if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlainTextExtractor;
    use async_trait::async_trait;

    /// Backend stub that replies with a fixed string.
    #[derive(Debug)]
    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("a grounded reply".to_string())
        }
    }

    /// Backend stub that always fails.
    #[derive(Debug)]
    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Http("connection refused".to_string()))
        }
    }

    fn session_with_text(text: &str) -> ChatSession {
        ChatSession::new(
            "test-session".to_string(),
            text.to_string(),
            DEFAULT_SYSTEM_PROMPT.to_string(),
        )
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  a \t b\n\n\nc  d\t\t\n e  "),
            "a b\nc d\ne"
        );
        assert_eq!(normalize_whitespace("\r\n\r\nx\r\ny"), "x\ny");
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_long_document_is_truncated_with_marker() {
        let session = session_with_text(&"x".repeat(7000));
        let prompt = session.build_prompt("q");
        let expected = format!("{}...", "x".repeat(6000));
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&"x".repeat(6001)));
    }

    #[test]
    fn test_short_document_is_verbatim_without_marker() {
        let session = session_with_text(&"y".repeat(500));
        let prompt = session.build_prompt("q");
        assert!(prompt.contains(&format!("Document content:\n{}\n", "y".repeat(500))));
        assert!(!prompt.contains(&format!("{}...", "y".repeat(500))));
    }

    #[test]
    fn test_exactly_window_sized_document_has_no_marker() {
        let session = session_with_text(&"z".repeat(6000));
        let prompt = session.build_prompt("q");
        assert!(!prompt.contains(&format!("{}...", "z".repeat(6000))));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        // Multi-byte characters: 6001 of them must cut at a char boundary.
        let session = session_with_text(&"é".repeat(6001));
        let prompt = session.build_prompt("q");
        assert!(prompt.contains(&format!("{}...", "é".repeat(6000))));
    }

    #[test]
    fn test_prompt_contains_system_prompt_and_question() {
        let session = session_with_text("body");
        let prompt = session.build_prompt("What is this about?");
        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(prompt.contains("User question: What is this about?"));
    }

    #[tokio::test]
    async fn test_history_grows_by_pairs_alternating_user_first() {
        let session = session_with_text("doc");
        for _ in 0..3 {
            session.send_message(&EchoGenerator, "hi").await.unwrap();
        }

        let history = session.history();
        assert_eq!(history.len(), 6);
        for (i, message) in history.iter().enumerate() {
            let expected = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            assert_eq!(message.role, expected);
        }
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "a grounded reply");
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_history_untouched() {
        let session = session_with_text("doc");
        session.send_message(&EchoGenerator, "first").await.unwrap();

        let result = session.send_message(&FailingGenerator, "second").await;
        assert!(matches!(result, Err(GenerationError::Http(_))));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let session = session_with_text("doc");
        session.send_message(&EchoGenerator, "hi").await.unwrap();

        session.clear();
        assert!(session.history().is_empty());
        session.clear();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_a_defensive_copy() {
        let session = session_with_text("doc");
        session.send_message(&EchoGenerator, "hi").await.unwrap();

        let mut copy = session.history();
        copy.clear();
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_info_tracks_state() {
        let session = session_with_text("abcde");
        assert_eq!(
            session.info(),
            SessionInfo {
                text_length: 5,
                message_count: 0
            }
        );

        session.send_message(&EchoGenerator, "hi").await.unwrap();
        assert_eq!(session.info().message_count, 2);
    }

    #[tokio::test]
    async fn test_initialize_normalizes_and_stores_text() {
        let session = ChatSession::initialize(
            "s1".to_string(),
            &PlainTextExtractor::new(),
            b"The   quick\n\n\nbrown fox.",
            "doc.txt",
            None,
        )
        .await
        .unwrap();

        assert_eq!(session.document_text, "The quick\nbrown fox.");
        assert_eq!(session.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_initialize_uses_custom_instruction() {
        let session = ChatSession::initialize(
            "s1".to_string(),
            &PlainTextExtractor::new(),
            b"text",
            "doc.txt",
            Some("Answer in French."),
        )
        .await
        .unwrap();

        assert_eq!(session.system_prompt, "Answer in French.");
    }

    #[tokio::test]
    async fn test_initialize_ignores_blank_custom_instruction() {
        let session = ChatSession::initialize(
            "s1".to_string(),
            &PlainTextExtractor::new(),
            b"text",
            "doc.txt",
            Some("   "),
        )
        .await
        .unwrap();

        assert_eq!(session.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_text() {
        let result = ChatSession::initialize(
            "s1".to_string(),
            &PlainTextExtractor::new(),
            b"  \n \t ",
            "doc.txt",
            None,
        )
        .await;

        assert!(matches!(result, Err(ExtractionError::NoText)));
    }

    #[test]
    fn test_message_serialization_shape() {
        let message = ChatMessage::user("hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
        assert!(value["timestamp"].is_string());
    }
}

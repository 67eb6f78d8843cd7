//! docchat
//!
//! A document-grounded chat service: upload a document, have its text
//! extracted, and hold a multi-turn conversation whose answers stay inside
//! that text.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP API (upload, message, history, clear)
//! - **Multipart**: hand-rolled state-machine parser for upload bodies
//! - **Sessions**: in-memory registry of document-bound conversations
//! - **Collaborators**: text extraction and text generation behind traits
//!
//! # Modules
//!
//! - [`multipart`]: multipart/form-data body decoding
//! - [`extract`]: document text extraction providers
//! - [`llm`]: text generation backend client
//! - [`session`]: chat sessions, prompt assembly, and the registry
//! - [`server`]: router and API handlers
//! - [`error`]: boundary error taxonomy
//! - [`config`]: layered application configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod multipart;
pub mod server;
pub mod session;

use std::sync::Arc;

use crate::config::AppConfig;
use extract::TextExtractor;
use llm::TextGenerator;
use session::SessionRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document text extractor.
    pub extractor: Arc<dyn TextExtractor>,
    /// Text generation backend.
    pub generator: Arc<dyn TextGenerator>,
    /// Registry of live chat sessions.
    pub sessions: SessionRegistry,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

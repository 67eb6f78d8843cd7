//! Process-wide session registry.
//!
//! Owns every live [`ChatSession`], keyed by an opaque identifier. The
//! registry is constructed once at server start and injected into the
//! request handlers; there is no global. Identifiers are random UUIDs,
//! collision-safe regardless of how quickly sessions are created.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use uuid::Uuid;

use crate::extract::{ExtractionError, TextExtractor};

use super::ChatSession;

/// Thread-safe store mapping session IDs to chat sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

#[derive(Debug)]
struct SessionRegistryInner {
    sessions: RwLock<HashMap<String, Arc<ChatSession>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a session from raw document bytes and store it.
    ///
    /// # Errors
    ///
    /// Fails when extraction fails or yields no text; nothing is stored in
    /// that case.
    pub async fn create(
        &self,
        extractor: &dyn TextExtractor,
        document: &[u8],
        filename: &str,
        custom_instruction: Option<&str>,
    ) -> Result<Arc<ChatSession>, ExtractionError> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(
            ChatSession::initialize(id.clone(), extractor, document, filename, custom_instruction)
                .await?,
        );
        self.inner
            .sessions
            .write()
            .unwrap()
            .insert(id, Arc::clone(&session));
        Ok(session)
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ChatSession>> {
        self.inner.sessions.read().unwrap().get(id).cloned()
    }

    /// Empty the history of the session with the given ID.
    ///
    /// Returns `None` when no such session exists. The entry itself is
    /// kept; only the history is reset.
    pub fn clear(&self, id: &str) -> Option<()> {
        self.get(id).map(|session| session.clear())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap().len()
    }

    /// Whether the registry holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been idle longer than `timeout`.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_idle(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.sessions.write().unwrap();
        let before = guard.len();
        guard.retain(|_, session| !session.is_idle_longer_than(timeout));
        before - guard.len()
    }
}

//! HTTP server: router construction and the four API handlers.
//!
//! The router is a stateless dispatcher. Each handler buffers whatever body
//! it needs in one read-to-completion step, does its work through the shared
//! [`AppState`], and maps every failure to a JSON error response via
//! [`ApiError`]; nothing escapes unhandled.

use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::multipart::{self, Part};
use crate::session::{ChatMessage, SessionInfo};

/// Multipart field carrying the document bytes.
const DOCUMENT_FIELD: &str = "pdf";

/// Multipart field carrying the optional custom instruction.
const CUSTOM_PROMPT_FIELD: &str = "customPrompt";

/// Start the server: spawn the idle-session sweeper and serve the router.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    if state.config.session.idle_timeout_minutes > 0 {
        let registry = state.sessions.clone();
        let idle = Duration::from_secs(state.config.session.idle_timeout_minutes * 60);
        let every = Duration::from_secs(state.config.session.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                let removed = registry.cleanup_idle(idle);
                if removed > 0 {
                    info!(name: "session.sweep", removed, "Idle sessions evicted");
                }
            }
        });
    }

    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    // A disabled timeout becomes a one-year deadline rather than a
    // conditionally-applied layer; axum's router type changes per layer.
    let timeout_duration = if state.config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60)
    } else {
        Duration::from_secs(30)
    };

    Router::new()
        .route("/upload-pdf", post(upload_document))
        .route("/send-message", post(send_message))
        .route("/conversation/{session_id}", get(get_conversation))
        .route("/clear-conversation/{session_id}", post(clear_conversation))
        .nest_service("/uploads", ServeDir::new(&state.config.upload.dir))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.upload.max_body_bytes))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Response for a successful document upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    session_id: String,
    session_info: SessionInfo,
    filename: String,
    file_url: String,
    message: String,
}

/// POST /upload-pdf: create a session from a multipart document upload.
async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multipart::boundary_from_content_type(content_type)?;
    let parts = multipart::parse_multipart(&body, &boundary)?;

    let file = parts
        .iter()
        .find(|p| p.name == DOCUMENT_FIELD)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "no document uploaded (expected part \"{DOCUMENT_FIELD}\")"
            ))
        })?;
    let custom_prompt = parts
        .iter()
        .find(|p| p.name == CUSTOM_PROMPT_FIELD)
        .map(|p| String::from_utf8_lossy(&p.data).into_owned());

    let stored = store_upload(&state.config.upload.dir, file).await?;
    let original_name = file.filename.clone().unwrap_or_else(|| stored.name.clone());

    let session = state
        .sessions
        .create(
            state.extractor.as_ref(),
            &file.data,
            &original_name,
            custom_prompt.as_deref(),
        )
        .await?;

    info!(
        name: "session.created",
        session_id = %session.id(),
        filename = %original_name,
        text_length = session.info().text_length,
        "Document uploaded and chat session initialized"
    );

    Ok(Json(UploadResponse {
        session_id: session.id().to_string(),
        session_info: session.info(),
        filename: original_name,
        file_url: stored.url,
        message: "Document uploaded and chat session initialized".to_string(),
    }))
}

/// Request body for the send-message endpoint.
///
/// Both fields are optional at the serde level so an absent field surfaces
/// as a validation failure, not a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Response for the send-message endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    response: String,
    conversation_history: Vec<ChatMessage>,
    timestamp: DateTime<Utc>,
}

/// POST /send-message: run one conversation turn.
async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let required =
        || ApiError::Validation("sessionId and message are required".to_string());
    let session_id = req
        .session_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(required)?;
    // The message goes into the prompt verbatim; only reject blank input.
    let message = req
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(required)?;

    let session = state
        .sessions
        .get(session_id)
        .ok_or_else(|| ApiError::SessionNotFound(session_id.to_string()))?;

    let reply = session
        .send_message(state.generator.as_ref(), message)
        .await?;

    Ok(Json(SendMessageResponse {
        response: reply,
        conversation_history: session.history(),
        timestamp: Utc::now(),
    }))
}

/// Response for the conversation endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_history: Vec<ChatMessage>,
    session_info: SessionInfo,
}

/// GET /conversation/{session_id}: fetch history and session info.
async fn get_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    Ok(Json(ConversationResponse {
        conversation_history: session.history(),
        session_info: session.info(),
    }))
}

/// POST /clear-conversation/{session_id}: reset a session's history.
async fn clear_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .sessions
        .clear(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;

    Ok(Json(
        json!({ "message": "Conversation cleared successfully" }),
    ))
}

/// JSON 404 for anything the router does not know.
async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Upload persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Where an uploaded document ended up on disk.
struct StoredUpload {
    /// Generated filename under the upload directory.
    name: String,
    /// Public URL the file is served back at.
    url: String,
}

/// Persist an uploaded document under a timestamp-unique name.
///
/// Filesystem glue, not part of the conversation core; any blob store
/// serving files back at a stable URL would do.
async fn store_upload(dir: &str, part: &Part) -> Result<StoredUpload, ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(anyhow::Error::from)?;

    let ext = part
        .filename
        .as_deref()
        .and_then(|f| std::path::Path::new(f).extension().and_then(|e| e.to_str()))
        .unwrap_or("bin");
    let name = format!(
        "doc-{}-{}.{ext}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );

    let path = std::path::Path::new(dir).join(&name);
    tokio::fs::write(&path, &part.data)
        .await
        .map_err(anyhow::Error::from)?;

    let url = format!("/uploads/{name}");
    Ok(StoredUpload { name, url })
}

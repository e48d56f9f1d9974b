//! HTTP request handlers

use super::assets::{get_index_html, serve_static};
use super::sse::relay_sse;
use super::types::{ChatReply, ChatRequest, ErrorResponse, HealthResponse};
use super::AppState;
use crate::relay;
use crate::session::DEFAULT_SESSION;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat page
        .route("/", get(serve_index))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Health check
        .route("/health", get(health))
        // One blocking turn
        .route("/chat", post(chat))
        // One streamed turn
        .route("/chat/stream", post(chat_stream))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Page
// ============================================================

async fn serve_index() -> impl IntoResponse {
    match get_index_html() {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html("<h1>404 - chat page not found</h1>".to_string()),
        )
            .into_response(),
    }
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.generator.model_id().to_string(),
    })
}

// ============================================================
// Chat
// ============================================================

/// Reject malformed input at the transport boundary, before the session
/// or the generation adapter is touched.
fn validate(req: &ChatRequest) -> Result<(), AppError> {
    if req.user_input.trim().is_empty() {
        return Err(AppError::BadRequest(
            "user_input must not be empty".to_string(),
        ));
    }
    Ok(())
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    validate(&req)?;
    let ChatRequest {
        user_input,
        session_id,
    } = req;

    let session = state
        .sessions
        .get_or_create(session_id.as_deref().unwrap_or(DEFAULT_SESSION))
        .await;
    let guard = session.lock_owned().await;

    let reply = relay::collect_turn(guard, state.generator.clone(), user_input)
        .await
        .map_err(|e| AppError::Generation(e.message))?;

    Ok(Json(ChatReply { reply }))
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate(&req)?;
    let ChatRequest {
        user_input,
        session_id,
    } = req;

    let session = state
        .sessions
        .get_or_create(session_id.as_deref().unwrap_or(DEFAULT_SESSION))
        .await;
    let guard = session.lock_owned().await;

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(32);
    tokio::spawn(relay::run_turn(
        guard,
        state.generator.clone(),
        user_input,
        events_tx,
    ));

    Ok(relay_sse(events_rx))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("ember-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Generation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Generation(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

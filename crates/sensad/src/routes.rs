//! API routes for sensad

use crate::router::RouterError;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sensa_common::{ChatRequest, ChatResponse};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

/// Reply when the turn could not be completed
pub const GENERIC_FAILURE: &str =
    "Something went wrong while processing your message. Please try again.";

/// Reply when the model could not be reached
pub const MODEL_UNAVAILABLE: &str =
    "The assistant is unavailable right now. Please try again later.";

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<ChatResponse> {
    Json(ChatResponse::success(
        "sensa API is running.",
        Some(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "threads": state.router.store().thread_count().await,
        })),
    ))
}

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new().route("/api/chat", post(chat))
}

async fn chat(
    State(state): State<AppStateArc>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ChatResponse>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            warn!("  Rejected chat body: {}", rejection);
            // Bodies cut off by the size limit keep their 413
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return (
                status,
                Json(ChatResponse::error(format!("Invalid request: {}", rejection))),
            );
        }
    };

    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error("Invalid request: 'message' is required.")),
        );
    }

    let thread_id = req
        .context
        .thread_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("  Chat on thread {}: {} chars", thread_id, req.message.len());

    match state.router.route(&thread_id, &req.message).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.reply)),
        Err(RouterError::Store(e)) => {
            error!("  Turn on {} aborted: {}", thread_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse::error(GENERIC_FAILURE)),
            )
        }
        Err(RouterError::Model(e)) => {
            error!("  Model failed on {}: {}", thread_id, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ChatResponse::error(MODEL_UNAVAILABLE)),
            )
        }
    }
}

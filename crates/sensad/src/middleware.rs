//! Request middleware: API key check and body size limit.

use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sensa_common::ChatResponse;
use std::sync::Arc;
use tracing::warn;

/// Header carrying the shared API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Maximum body size: 64 KiB
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Reject requests without the configured API key before any work is done.
///
/// An unconfigured key rejects everything.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if !state.api_key.is_empty() && key == state.api_key => next.run(request).await,
        other => {
            warn!(
                "Unauthorized access attempt on {}: key {}",
                request.uri().path(),
                other.map(mask_key).unwrap_or_else(|| "missing".to_string())
            );
            (
                StatusCode::UNAUTHORIZED,
                Json(ChatResponse::error("Unauthorized: Invalid or missing API Key.")),
            )
                .into_response()
        }
    }
}

/// Body size limit middleware
///
/// Checks Content-Length header and rejects requests exceeding MAX_BODY_SIZE
pub async fn body_size_limit(request: Request, next: Next) -> Result<Response, StatusCode> {
    if let Some(content_length) = request.headers().get("content-length") {
        if let Ok(length) = content_length.to_str().unwrap_or_default().parse::<usize>() {
            if length > MAX_BODY_SIZE {
                warn!(
                    "Request body too large: {} bytes (max: {})",
                    length, MAX_BODY_SIZE
                );
                return Err(StatusCode::PAYLOAD_TOO_LARGE);
            }
        }
    }

    Ok(next.run(request).await)
}

/// Mask key for logging (show first 4 chars only)
pub fn mask_key(key: &str) -> String {
    if key.chars().count() > 8 {
        format!("{}...", key.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "***");
        assert_eq!(mask_key("12345678"), "***");
        assert_eq!(mask_key("1234567890abcdef"), "1234...");
    }
}

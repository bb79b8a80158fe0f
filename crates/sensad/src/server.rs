//! HTTP server for sensad

use crate::middleware::{body_size_limit, require_api_key, MAX_BODY_SIZE};
use crate::router::TurnRouter;
use crate::routes;
use anyhow::Result;
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub router: TurnRouter,
    pub api_key: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(router: TurnRouter, api_key: impl Into<String>) -> Self {
        Self {
            router,
            api_key: api_key.into(),
            start_time: Instant::now(),
        }
    }
}

/// Build the application with all routes and middleware
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::chat_routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        // Enforced while streaming, for bodies sent without Content-Length
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(middleware::from_fn(body_size_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until the process is stopped
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let app = app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

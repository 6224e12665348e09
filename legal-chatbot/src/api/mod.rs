//! HTTP API: axum router over [`AppState`].

mod chat;
mod conversations;
mod documents;
mod graph;
mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::components::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Full application router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route(
            "/api/conversations",
            post(conversations::create).get(conversations::list),
        )
        .route(
            "/api/conversations/:id",
            get(conversations::detail)
                .patch(conversations::rename)
                .delete(conversations::remove),
        )
        .route("/api/conversations/:id/messages", get(conversations::messages))
        .route("/api/chat/:id", post(chat::chat))
        .route("/api/chat/:id/stream", post(chat::chat_stream))
        .route("/api/documents/:id", get(documents::list))
        .route("/api/documents/:id/upload", post(documents::upload))
        .route("/api/documents/:id/status", get(documents::status))
        .route("/api/documents/:id/index", post(documents::index))
        .route("/api/documents/:id/:document_id", delete(documents::remove))
        .route("/api/graph/:id/data", get(graph::data))
        .route("/api/graph/:id/summary", get(graph::summary))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

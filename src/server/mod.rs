//! HTTP surface: REST endpoints plus the SSE stream.
//!
//! ```text
//! POST   /api/queue                    enqueue a job, get request_id + stream_url
//! GET    /api/stream/:request_id       SSE: replay + live events until terminal
//! GET    /api/sessions                 list sessions (newest first)
//! GET    /api/sessions/:session_id     history + summary
//! DELETE /api/sessions/:session_id     clear one session (idempotent)
//! DELETE /api/sessions                 clear all sessions
//! POST   /api/feedback                 append a thumbs-up/down record
//! GET    /api/analytics/feedback       aggregate satisfaction, per tool
//! GET    /health                       liveness + configured backends
//! ```

pub mod handlers;
pub mod sse;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::broker::Broker;
use crate::config::Settings;
use crate::llm::LanguageModel;
use crate::session::SessionService;
use crate::store::FeedbackStore;
use crate::tools::ToolAdapters;

/// Shared handler state: every service the endpoints touch.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub broker: Broker,
    pub sessions: SessionService,
    pub feedback: Arc<dyn FeedbackStore>,
    pub llm: Arc<dyn LanguageModel>,
    pub tools: Arc<ToolAdapters>,
}

/// Build the full API router.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/queue", post(handlers::queue))
        .route("/api/stream/:request_id", get(sse::stream))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).delete(handlers::clear_all_sessions),
        )
        .route(
            "/api/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/feedback", post(handlers::save_feedback))
        .route("/api/analytics/feedback", get(handlers::feedback_analytics))
        .with_state(ctx)
}

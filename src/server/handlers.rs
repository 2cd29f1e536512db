//! REST handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::broker::{BrokerError, Job};
use crate::store::{Feedback, FeedbackFilter, FeedbackKind, StoreError};
use crate::types::ToolKind;

use super::AppContext;

/// Handler-level failures mapped onto HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Unavailable(msg) => ApiError::Unavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub request_id: String,
    pub stream_url: String,
}

/// `POST /api/queue` — enqueue a job for the workers.
pub async fn queue(
    State(ctx): State<AppContext>,
    Json(request): Json<QueueRequest>,
) -> Result<Json<QueueResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    if !ctx.broker.available() {
        return Err(ApiError::Unavailable("broker unavailable".to_string()));
    }
    let mut job = Job::new(request.session_id, request.query);
    job.target_language = request.target_language;
    job.model = request.model;
    let request_id = job.request_id.clone();
    ctx.broker.enqueue(job)?;
    info!(%request_id, depth = ctx.broker.queue_depth(), "job enqueued");
    Ok(Json(QueueResponse {
        success: true,
        stream_url: format!("/api/stream/{request_id}"),
        request_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsParams {
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /api/sessions`
pub async fn list_sessions(
    State(ctx): State<AppContext>,
    Query(params): Query<ListSessionsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let since = params.since.as_deref().map(parse_date).transpose()?;
    let sessions = ctx
        .sessions
        .list(since, params.limit.unwrap_or(100))
        .await?;
    Ok(Json(json!({ "success": true, "sessions": sessions })))
}

/// `GET /api/sessions/:session_id`
pub async fn get_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = ctx
        .sessions
        .get_state(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {session_id}")))?;
    let history: Vec<_> = state
        .chat_history
        .iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect();
    Ok(Json(json!({
        "success": true,
        "session_id": session_id,
        "history": history,
        "summary": state.summary,
    })))
}

/// `DELETE /api/sessions/:session_id` — idempotent, always 200.
pub async fn delete_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.sessions.delete(&session_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("context cleared for session '{session_id}'"),
    })))
}

/// `DELETE /api/sessions` — clear everything.
pub async fn clear_all_sessions(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = ctx.sessions.list(None, usize::MAX).await?;
    for summary in &sessions {
        ctx.sessions.delete(&summary.session_id).await?;
    }
    Ok(Json(json!({
        "success": true,
        "message": format!("{} sessions cleared", sessions.len()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub message_index: i64,
    pub feedback_type: String,
    pub user_query: String,
    pub assistant_response: String,
    #[serde(default)]
    pub routing_decision: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
}

/// `POST /api/feedback`
pub async fn save_feedback(
    State(ctx): State<AppContext>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = FeedbackKind::parse(&request.feedback_type).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "feedback_type must be 'up' or 'down', got '{}'",
            request.feedback_type
        ))
    })?;
    let feedback = Feedback {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: request.session_id,
        message_index: request.message_index,
        feedback_type: kind,
        user_query: request.user_query,
        assistant_response: request.assistant_response,
        routing_decision: request.routing_decision,
        intent: request.intent,
        model_used: request.model_used,
        response_time_ms: request.response_time_ms,
        created_at: Utc::now(),
    };
    let feedback_id = ctx.feedback.append(feedback).await?;
    Ok(Json(json!({ "success": true, "feedback_id": feedback_id })))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub routing_decision: Option<String>,
}

/// `GET /api/analytics/feedback`
pub async fn feedback_analytics(
    State(ctx): State<AppContext>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = FeedbackFilter {
        start_date: params.start_date.as_deref().map(parse_date).transpose()?,
        routing_decision: params.routing_decision,
    };
    let analytics = ctx.feedback.analytics(filter).await?;
    Ok(Json(json!({ "success": true, "analytics": analytics })))
}

/// `GET /health`
pub async fn health(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "backends": {
            "llm": ctx.llm.configured(),
            "search": ctx.tools.configured(ToolKind::WebSearch),
            "retrieval": ctx.tools.configured(ToolKind::InternalRetrieval),
            "broker": ctx.broker.available(),
            "store": ctx.sessions.store_available(),
        }
    }))
}

/// Accept RFC 3339 timestamps or bare dates.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(ApiError::BadRequest(format!("unparseable date: {raw}")))
}

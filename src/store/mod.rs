//! Persistence: checkpoints, session index, feedback.
//!
//! Two pluggable trait seams — [`CheckpointStore`] for graph state keyed by
//! session, [`FeedbackStore`] for immutable thumbs-up/down records — with an
//! in-memory backend for tests/development and a SQLite backend for durable
//! deployments.
//!
//! Checkpoints carry a monotonic per-session sequence. A save with a
//! sequence at or below the stored maximum is rejected as stale, which is
//! how concurrent writers resolve to last-writer-wins.

pub mod feedback;
pub mod memory;
pub mod sqlite;

pub use feedback::{
    Feedback, FeedbackAnalytics, FeedbackFilter, FeedbackKind, FeedbackStore, ToolFeedback,
};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::Settings;
use crate::state::AgentState;

/// Characters of summary kept in the session index for listings.
pub const SUMMARY_PREVIEW_CHARS: usize = 160;

/// Errors surfaced by the stores.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    #[diagnostic(code(askgraph::store::backend))]
    Backend(String),

    /// A newer checkpoint already exists for this session.
    #[error("stale write for session {session_id}: sequence {sequence} is not newer")]
    #[diagnostic(
        code(askgraph::store::stale_write),
        help("Reload the latest checkpoint and retry with a higher sequence.")
    )]
    StaleWrite { session_id: String, sequence: u64 },

    #[error("store serialization error: {0}")]
    #[diagnostic(code(askgraph::store::serde))]
    Serde(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

/// A persisted snapshot of [`AgentState`] for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    /// Strictly increasing per session; ties and regressions are rejected.
    pub sequence: u64,
    pub state: AgentState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(session_id: impl Into<String>, sequence: u64, state: AgentState) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
            state,
            saved_at: Utc::now(),
        }
    }
}

/// One row of `GET /api/sessions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Truncated to [`SUMMARY_PREVIEW_CHARS`].
    pub summary: String,
    pub last_updated: DateTime<Utc>,
}

/// Truncate a summary for the session index.
#[must_use]
pub fn summary_preview(summary: &str) -> String {
    if summary.chars().count() <= SUMMARY_PREVIEW_CHARS {
        summary.to_string()
    } else {
        summary.chars().take(SUMMARY_PREVIEW_CHARS).collect()
    }
}

/// Checkpoint persistence keyed by session.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Atomic write; rejects sequences at or below the stored maximum.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// The canonical (highest-sequence) checkpoint, if any.
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Sessions ordered newest-first, optionally bounded by `since`.
    async fn list_sessions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError>;

    /// Remove every checkpoint under the session. Idempotent.
    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// Whether the backend is reachable. Reported by `/health`.
    fn available(&self) -> bool {
        true
    }
}

/// Open the checkpoint and feedback stores configured by `STORE_URL`:
/// a `sqlite://` URL selects the durable backend, anything else (including
/// empty) the in-memory one.
pub async fn open_stores(
    settings: &Settings,
) -> Result<(Arc<dyn CheckpointStore>, Arc<dyn FeedbackStore>), StoreError> {
    if settings.store_url.starts_with("sqlite:") {
        let store = Arc::new(SqliteStore::connect(&settings.store_url).await?);
        Ok((store.clone(), store))
    } else {
        let store = Arc::new(MemoryStore::new());
        Ok((store.clone(), store))
    }
}

//! SQLite-backed store.
//!
//! One row per checkpoint under `(session_id, sequence)`, a session index
//! table carrying the truncated summary and last-updated stamp for fast
//! listings, and an append-only feedback table. Embedded migrations run on
//! connect.
//!
//! Timestamps are stored as RFC 3339 UTC text, which compares correctly as
//! strings, so range filters work without date functions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};
use tracing::instrument;

use super::feedback::{
    satisfaction_rate, Feedback, FeedbackAnalytics, FeedbackFilter, FeedbackStore, ToolFeedback,
};
use super::{summary_preview, Checkpoint, CheckpointStore, SessionSummary, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (or create) the database at `database_url` and run pending
    /// migrations. Example URL: `sqlite://askgraph.db`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        // Make sure the backing file exists; the sqlite driver will not
        // create intermediate directories on its own.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.trim();
            if !path.is_empty() && path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if !p.exists() {
                    let _ = std::fs::File::create_new(p);
                }
            }
        }
        // An in-memory database exists per connection; pooling more than one
        // would scatter tables across private databases.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 10 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failure: {e}")))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serde(format!("bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl CheckpointStore for SqliteStore {
    #[instrument(skip(self, checkpoint), fields(session_id = %checkpoint.session_id, sequence = checkpoint.sequence), err)]
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(&checkpoint.state)?;
        let mut tx = self.pool.begin().await?;

        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM checkpoints WHERE session_id = ?")
                .bind(&checkpoint.session_id)
                .fetch_one(&mut *tx)
                .await?;
        if let Some(max) = max {
            if checkpoint.sequence as i64 <= max {
                return Err(StoreError::StaleWrite {
                    session_id: checkpoint.session_id,
                    sequence: checkpoint.sequence,
                });
            }
        }

        sqlx::query(
            "INSERT INTO checkpoints (session_id, sequence, state_json, saved_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&checkpoint.session_id)
        .bind(checkpoint.sequence as i64)
        .bind(&state_json)
        .bind(checkpoint.saved_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO session_index (session_id, summary, last_updated) VALUES (?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET \
             summary = excluded.summary, last_updated = excluded.last_updated",
        )
        .bind(&checkpoint.session_id)
        .bind(summary_preview(&checkpoint.state.summary))
        .bind(checkpoint.saved_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query(
            "SELECT sequence, state_json, saved_at FROM checkpoints \
             WHERE session_id = ? ORDER BY sequence DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let sequence: i64 = row.try_get("sequence")?;
        let state_json: String = row.try_get("state_json")?;
        let saved_at: String = row.try_get("saved_at")?;
        Ok(Some(Checkpoint {
            session_id: session_id.to_string(),
            sequence: sequence as u64,
            state: serde_json::from_str(&state_json)?,
            saved_at: parse_timestamp(&saved_at)?,
        }))
    }

    async fn list_sessions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT session_id, summary, last_updated FROM session_index WHERE 1 = 1",
        );
        if let Some(since) = since {
            qb.push(" AND last_updated >= ");
            qb.push_bind(since.to_rfc3339());
        }
        qb.push(" ORDER BY last_updated DESC LIMIT ");
        qb.push_bind(limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let last_updated: String = row.try_get("last_updated")?;
                Ok(SessionSummary {
                    session_id: row.try_get("session_id")?,
                    summary: row.try_get("summary")?,
                    last_updated: parse_timestamp(&last_updated)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM checkpoints WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_index WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    fn available(&self) -> bool {
        !self.pool.is_closed()
    }
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    async fn append(&self, feedback: Feedback) -> Result<String, StoreError> {
        sqlx::query(
            "INSERT INTO feedback (id, session_id, message_index, feedback_type, user_query, \
             assistant_response, routing_decision, intent, model_used, response_time_ms, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&feedback.id)
        .bind(&feedback.session_id)
        .bind(feedback.message_index)
        .bind(feedback.feedback_type.as_str())
        .bind(&feedback.user_query)
        .bind(&feedback.assistant_response)
        .bind(feedback.routing_decision.as_deref())
        .bind(feedback.intent.as_deref())
        .bind(feedback.model_used.as_deref())
        .bind(feedback.response_time_ms)
        .bind(feedback.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(feedback.id)
    }

    async fn analytics(&self, filter: FeedbackFilter) -> Result<FeedbackAnalytics, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT COALESCE(routing_decision, 'unknown') AS tool, COUNT(*) AS total, \
             SUM(CASE WHEN feedback_type = 'up' THEN 1 ELSE 0 END) AS ups \
             FROM feedback WHERE 1 = 1",
        );
        if let Some(start) = filter.start_date {
            qb.push(" AND created_at >= ");
            qb.push_bind(start.to_rfc3339());
        }
        if let Some(tool) = &filter.routing_decision {
            qb.push(" AND routing_decision = ");
            qb.push_bind(tool.clone());
        }
        qb.push(" GROUP BY tool ORDER BY tool");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut total = 0u64;
        let mut thumbs_up = 0u64;
        let mut by_routing_decision = Vec::with_capacity(rows.len());
        for row in rows {
            let tool: String = row.try_get("tool")?;
            let tool_total: i64 = row.try_get("total")?;
            let tool_up: i64 = row.try_get("ups")?;
            total += tool_total as u64;
            thumbs_up += tool_up as u64;
            by_routing_decision.push(ToolFeedback {
                routing_decision: tool,
                total: tool_total as u64,
                thumbs_up: tool_up as u64,
                thumbs_down: (tool_total - tool_up) as u64,
                satisfaction_rate: satisfaction_rate(tool_up as u64, tool_total as u64),
            });
        }
        Ok(FeedbackAnalytics {
            total,
            thumbs_up,
            thumbs_down: total - thumbs_up,
            satisfaction_rate: satisfaction_rate(thumbs_up, total),
            by_routing_decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentState;
    use crate::store::feedback::FeedbackKind;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn checkpoint_round_trip() {
        let store = store().await;
        let mut state = AgentState::new("what changed?");
        state.summary = "a summary".to_string();
        store
            .save(Checkpoint::new("s1", 1, state.clone()))
            .await
            .unwrap();
        let loaded = store.load_latest("s1").await.unwrap().unwrap();
        assert_eq!(loaded.sequence, 1);
        assert_eq!(loaded.state, state);
    }

    #[tokio::test]
    async fn stale_writes_are_rejected_in_sqlite_too() {
        let store = store().await;
        store
            .save(Checkpoint::new("s1", 5, AgentState::new("q")))
            .await
            .unwrap();
        let err = store
            .save(Checkpoint::new("s1", 5, AgentState::new("q")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn delete_session_removes_index_and_checkpoints() {
        let store = store().await;
        store
            .save(Checkpoint::new("s1", 1, AgentState::new("q")))
            .await
            .unwrap();
        store.delete_session("s1").await.unwrap();
        store.delete_session("s1").await.unwrap();
        assert!(store.load_latest("s1").await.unwrap().is_none());
        assert!(store.list_sessions(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn feedback_analytics_aggregate_in_sql() {
        let store = store().await;
        for (kind, tool) in [
            (FeedbackKind::Up, "web_search"),
            (FeedbackKind::Down, "web_search"),
            (FeedbackKind::Up, "calculator"),
        ] {
            store
                .append(Feedback {
                    id: uuid::Uuid::new_v4().to_string(),
                    session_id: "s1".to_string(),
                    message_index: 0,
                    feedback_type: kind,
                    user_query: "q".to_string(),
                    assistant_response: "a".to_string(),
                    routing_decision: Some(tool.to_string()),
                    intent: None,
                    model_used: Some("gpt-4o-mini".to_string()),
                    response_time_ms: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let analytics = store.analytics(FeedbackFilter::default()).await.unwrap();
        assert_eq!(analytics.total, 3);
        assert_eq!(analytics.thumbs_up, 2);
        assert_eq!(analytics.by_routing_decision.len(), 2);

        let filtered = store
            .analytics(FeedbackFilter {
                routing_decision: Some("calculator".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.satisfaction_rate, 100.0);
    }
}

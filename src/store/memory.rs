//! Volatile store for tests and development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::feedback::{aggregate, Feedback, FeedbackAnalytics, FeedbackFilter, FeedbackStore};
use super::{summary_preview, Checkpoint, CheckpointStore, SessionSummary, StoreError};

/// In-memory checkpoint and feedback store.
///
/// Sequence ordering and delete idempotence match the durable backend, so
/// the two are interchangeable in tests.
#[derive(Default)]
pub struct MemoryStore {
    checkpoints: RwLock<FxHashMap<String, BTreeMap<u64, Checkpoint>>>,
    feedback: RwLock<Vec<Feedback>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let mut sessions = self.checkpoints.write();
        let session = sessions
            .entry(checkpoint.session_id.clone())
            .or_insert_with(BTreeMap::new);
        if let Some((&max, _)) = session.last_key_value() {
            if checkpoint.sequence <= max {
                return Err(StoreError::StaleWrite {
                    session_id: checkpoint.session_id,
                    sequence: checkpoint.sequence,
                });
            }
        }
        session.insert(checkpoint.sequence, checkpoint);
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self
            .checkpoints
            .read()
            .get(session_id)
            .and_then(|session| session.last_key_value())
            .map(|(_, checkpoint)| checkpoint.clone()))
    }

    async fn list_sessions(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.checkpoints.read();
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter_map(|session| session.last_key_value())
            .map(|(_, checkpoint)| SessionSummary {
                session_id: checkpoint.session_id.clone(),
                summary: summary_preview(&checkpoint.state.summary),
                last_updated: checkpoint.saved_at,
            })
            .filter(|summary| since.map(|s| summary.last_updated >= s).unwrap_or(true))
            .collect();
        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.checkpoints.write().remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn append(&self, feedback: Feedback) -> Result<String, StoreError> {
        let id = feedback.id.clone();
        self.feedback.write().push(feedback);
        Ok(id)
    }

    async fn analytics(&self, filter: FeedbackFilter) -> Result<FeedbackAnalytics, StoreError> {
        let records = self.feedback.read();
        Ok(aggregate(records.iter().filter(|f| filter.matches(f))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentState;

    #[tokio::test]
    async fn stale_sequences_are_rejected() {
        let store = MemoryStore::new();
        store
            .save(Checkpoint::new("s1", 2, AgentState::new("q")))
            .await
            .unwrap();
        let err = store
            .save(Checkpoint::new("s1", 2, AgentState::new("q2")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { sequence: 2, .. }));
        let err = store
            .save(Checkpoint::new("s1", 1, AgentState::new("q3")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn latest_checkpoint_wins() {
        let store = MemoryStore::new();
        for seq in 1..=3 {
            store
                .save(Checkpoint::new("s1", seq, AgentState::new(format!("q{seq}"))))
                .await
                .unwrap();
        }
        let latest = store.load_latest("s1").await.unwrap().unwrap();
        assert_eq!(latest.sequence, 3);
        assert_eq!(latest.state.query, "q3");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .save(Checkpoint::new("s1", 1, AgentState::new("q")))
            .await
            .unwrap();
        store.delete_session("s1").await.unwrap();
        store.delete_session("s1").await.unwrap();
        assert!(store.load_latest("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_truncated() {
        let store = MemoryStore::new();
        for (i, session) in ["a", "b", "c"].iter().enumerate() {
            let mut state = AgentState::new("q");
            state.summary = format!("summary {session}");
            let mut checkpoint = Checkpoint::new(*session, 1, state);
            checkpoint.saved_at = Utc::now() + chrono::Duration::seconds(i as i64);
            store.save(checkpoint).await.unwrap();
        }
        let listed = store.list_sessions(None, 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "c");
        assert_eq!(listed[1].session_id, "b");
    }
}

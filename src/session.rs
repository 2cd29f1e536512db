//! Session service: the worker- and API-facing view over checkpoints.
//!
//! Sessions are created lazily — the first saved checkpoint creates one —
//! and the latest checkpoint is always the canonical view. This service owns
//! sequence allocation: callers hand it a state, it stamps the next sequence
//! and retries once if another writer got there first (last writer wins).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::message::Message;
use crate::state::AgentState;
use crate::store::{Checkpoint, CheckpointStore, SessionSummary, StoreError};

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn CheckpointStore>,
}

impl SessionService {
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Most recent state for the session, or `None` before its first run.
    pub async fn get_state(&self, session_id: &str) -> Result<Option<AgentState>, StoreError> {
        Ok(self
            .store
            .load_latest(session_id)
            .await?
            .map(|checkpoint| checkpoint.state))
    }

    /// Persist `state` as the session's next checkpoint, returning the
    /// sequence written.
    ///
    /// On a sequence collision with a concurrent writer, reloads and retries
    /// once with a higher sequence; a second collision surfaces the error.
    #[instrument(skip(self, state), err)]
    pub async fn save_state(
        &self,
        session_id: &str,
        state: AgentState,
    ) -> Result<u64, StoreError> {
        let mut sequence = self.next_sequence(session_id).await?;
        match self
            .store
            .save(Checkpoint::new(session_id, sequence, state.clone()))
            .await
        {
            Ok(()) => Ok(sequence),
            Err(StoreError::StaleWrite { .. }) => {
                sequence = self.next_sequence(session_id).await?;
                self.store
                    .save(Checkpoint::new(session_id, sequence, state))
                    .await?;
                Ok(sequence)
            }
            Err(err) => Err(err),
        }
    }

    /// Chat history materialized from the latest checkpoint.
    pub async fn get_history(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .get_state(session_id)
            .await?
            .map(|state| state.chat_history)
            .unwrap_or_default())
    }

    pub async fn list(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        self.store.list_sessions(since, limit).await
    }

    /// Remove the session and everything persisted under it. Idempotent.
    pub async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.delete_session(session_id).await
    }

    #[must_use]
    pub fn store_available(&self) -> bool {
        self.store.available()
    }

    async fn next_sequence(&self, session_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .store
            .load_latest(session_id)
            .await?
            .map(|checkpoint| checkpoint.sequence + 1)
            .unwrap_or(1))
    }
}

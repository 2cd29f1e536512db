//! Finalize: settle the answer that ships.
//!
//! Order of preference: the translator's rendering, then the draft (with a
//! citations footer when evidence backed it), then an apology stub. The
//! worker — not this node — appends the turn to the session afterwards.

use async_trait::async_trait;

use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, StateDelta};

/// Shipped when no stage managed to produce an answer.
pub const APOLOGY_STUB: &str = "I apologize, but I couldn't generate an answer.";

pub struct FinalizeNode;

#[async_trait]
impl AgentNode for FinalizeNode {
    async fn run(&self, state: &AgentState, _ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let final_answer = match (&state.final_answer, &state.draft_answer) {
            (Some(translated), _) => translated.clone(),
            (None, Some(draft)) => {
                if state.citations.is_empty() {
                    draft.clone()
                } else {
                    format!("{draft}\n\nCitations: {:?}", state.citations)
                }
            }
            (None, None) => APOLOGY_STUB.to_string(),
        };
        Ok(StateDelta {
            final_answer: Some(final_answer),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::ScriptedModel;
    use crate::tools::ToolAdapters;
    use crate::types::Stage;
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx() -> NodeContext {
        NodeContext {
            request_id: "req".to_string(),
            session_id: "s".to_string(),
            stage: Stage::Finalize,
            attempt: 0,
            llm: Arc::new(ScriptedModel::new()),
            tools: Arc::new(ToolAdapters::new(Duration::from_secs(1))),
            settings: Arc::new(Settings::default()),
        }
    }

    #[tokio::test]
    async fn translator_output_wins() {
        let mut state = AgentState::new("q");
        state.draft_answer = Some("draft".to_string());
        state.final_answer = Some("traduction".to_string());
        let delta = FinalizeNode.run(&state, &ctx()).await.unwrap();
        assert_eq!(delta.final_answer.as_deref(), Some("traduction"));
    }

    #[tokio::test]
    async fn draft_gains_a_citations_footer() {
        let mut state = AgentState::new("q");
        state.draft_answer = Some("draft".to_string());
        state.citations = vec![0, 2];
        let delta = FinalizeNode.run(&state, &ctx()).await.unwrap();
        assert_eq!(
            delta.final_answer.as_deref(),
            Some("draft\n\nCitations: [0, 2]")
        );
    }

    #[tokio::test]
    async fn empty_run_ships_the_apology_stub() {
        let delta = FinalizeNode.run(&AgentState::new("q"), &ctx()).await.unwrap();
        assert_eq!(delta.final_answer.as_deref(), Some(APOLOGY_STUB));
    }
}

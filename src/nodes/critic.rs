//! Critic: review the draft before it ships.
//!
//! Verdicts follow a strict policy: `rejected` is reserved for safety or
//! policy violations and replaces the draft with a sanitized refusal;
//! everything else is `needs_revision` (with concrete instructions) or
//! `approved`. A critique the model garbles counts as approval — the critic
//! exists to catch bad drafts, not to block good ones.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::llm::LlmError;
use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, Critique, StateDelta};
use crate::types::Verdict;

/// What a rejected run says instead of the draft.
const SANITIZED_REFUSAL: &str =
    "I can't help with that request.";

pub struct CriticNode;

#[derive(Deserialize)]
struct ModelCritique {
    verdict: String,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    instructions: String,
}

#[async_trait]
impl AgentNode for CriticNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let draft = state.draft_answer.as_deref().ok_or(NodeError::MissingInput {
            what: "draft_answer",
        })?;
        let mut evidence_block = String::new();
        for ev in &state.retrieved_context {
            evidence_block.push_str(&format!("- ({}) {}\n", ev.source, ev.text));
        }
        let prompt = format!(
            "You are a strict quality reviewer. Check the draft for factual \
             consistency with the sources, completeness against the question, \
             unsupported claims, and safety. Use verdict \"rejected\" only for \
             safety or policy violations.\n\
             Respond with JSON: {{\"verdict\": \"approved\"|\"needs_revision\"|\"rejected\", \
             \"reasons\": [...], \"instructions\": ...}}.\n\n\
             Question: {query}\n\
             Sources:\n{evidence_block}\n\
             Draft answer:\n{draft}",
            query = state.query,
        );
        let critique = match ctx.llm.complete(&prompt).await {
            Ok(response) => parse_critique(&response),
            Err(err) if err.retryable() => return Err(err.into()),
            Err(LlmError::Unconfigured | LlmError::Malformed(_) | LlmError::Unavailable(_)) => None,
        };
        let critique = critique.unwrap_or_else(|| {
            warn!("critique unavailable or unparseable, approving draft");
            Critique {
                verdict: Verdict::Approved,
                reasons: vec!["no usable critique produced".to_string()],
                instructions: String::new(),
            }
        });

        let mut delta = StateDelta {
            critique: Some(critique.clone()),
            ..Default::default()
        };
        if critique.verdict == Verdict::Rejected {
            delta.draft_answer = Some(SANITIZED_REFUSAL.to_string());
        }
        Ok(delta)
    }
}

fn parse_critique(response: &str) -> Option<Critique> {
    let parsed: ModelCritique = super::parse_json_block(response)?;
    Some(Critique {
        verdict: Verdict::parse(&parsed.verdict)?,
        reasons: parsed.reasons,
        instructions: parsed.instructions,
    })
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

    fn ctx(llm: ScriptedModel) -> NodeContext {
        NodeContext {
            request_id: "req".to_string(),
            session_id: "s".to_string(),
            stage: Stage::Critic,
            attempt: 0,
            llm: Arc::new(llm),
            tools: Arc::new(ToolAdapters::new(Duration::from_secs(1))),
            settings: Arc::new(Settings::default()),
        }
    }

    fn drafted_state() -> AgentState {
        let mut state = AgentState::new("q");
        state.draft_answer = Some("a draft".to_string());
        state
    }

    #[tokio::test]
    async fn needs_revision_carries_instructions() {
        let llm = ScriptedModel::with_responses([
            r#"{"verdict": "needs_revision", "reasons": ["vague"], "instructions": "be specific"}"#,
        ]);
        let delta = CriticNode.run(&drafted_state(), &ctx(llm)).await.unwrap();
        let critique = delta.critique.unwrap();
        assert_eq!(critique.verdict, Verdict::NeedsRevision);
        assert_eq!(critique.instructions, "be specific");
        assert!(delta.draft_answer.is_none());
    }

    #[tokio::test]
    async fn rejection_sanitizes_the_draft() {
        let llm = ScriptedModel::with_responses([
            r#"{"verdict": "rejected", "reasons": ["unsafe"], "instructions": ""}"#,
        ]);
        let delta = CriticNode.run(&drafted_state(), &ctx(llm)).await.unwrap();
        assert_eq!(delta.critique.unwrap().verdict, Verdict::Rejected);
        assert_eq!(delta.draft_answer.as_deref(), Some(SANITIZED_REFUSAL));
    }

    #[tokio::test]
    async fn unparseable_critique_approves() {
        let llm = ScriptedModel::with_responses(["looks fine to me!"]);
        let delta = CriticNode.run(&drafted_state(), &ctx(llm)).await.unwrap();
        assert_eq!(delta.critique.unwrap().verdict, Verdict::Approved);
    }

    #[tokio::test]
    async fn missing_draft_is_an_input_error() {
        let err = CriticNode
            .run(&AgentState::new("q"), &ctx(ScriptedModel::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::MissingInput { .. }));
    }
}

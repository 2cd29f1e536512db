//! Generator: compose the draft answer.
//!
//! Three modes, picked from state:
//!
//! - **Calculator shortcut**: the expression is evaluated locally and the
//!   result becomes both the evidence and the draft — no model call.
//! - **Revision** (`revision_count > 0` with a critique present): the draft
//!   is rewritten according to the critic's instructions.
//! - **Normal**: the model composes an answer over the query, plan, and
//!   numbered evidence, returning the citation indices it used.

use async_trait::async_trait;
use serde::Deserialize;

use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, StateDelta};
use crate::types::ToolKind;

pub struct GeneratorNode;

#[derive(Deserialize)]
struct ModelAnswer {
    answer: String,
    #[serde(default)]
    citations: Vec<usize>,
}

#[async_trait]
impl AgentNode for GeneratorNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        match state.routed_tool() {
            Some(ToolKind::Calculator) => self.calculate(state, ctx).await,
            // The translator owns this path; nothing to draft.
            Some(ToolKind::Translate) => Ok(StateDelta::default()),
            _ if state.revision_count > 0 && state.critique.is_some() => {
                self.revise(state, ctx).await
            }
            _ => self.compose(state, ctx).await,
        }
    }
}

impl GeneratorNode {
    async fn calculate(
        &self,
        state: &AgentState,
        ctx: &NodeContext,
    ) -> Result<StateDelta, NodeError> {
        let evidence = ctx
            .tools
            .run_tool(ToolKind::Calculator, &state.query, None)
            .await?;
        let draft = evidence
            .first()
            .map(|e| e.text.clone())
            .ok_or(NodeError::MissingInput {
                what: "calculator result",
            })?;
        Ok(StateDelta {
            retrieved_context: Some(evidence),
            draft_answer: Some(draft),
            citations: Some(vec![0]),
            ..Default::default()
        })
    }

    async fn revise(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let draft = state.draft_answer.as_deref().ok_or(NodeError::MissingInput {
            what: "draft_answer",
        })?;
        let critique = state.critique.as_ref().ok_or(NodeError::MissingInput {
            what: "critique",
        })?;
        let prompt = format!(
            "Revise the draft answer. Apply every instruction; keep what was \
             already correct.\n\n\
             Question: {query}\n\
             Draft answer:\n{draft}\n\n\
             Reviewer instructions:\n{instructions}\n\n\
             Revised answer:",
            query = state.query,
            instructions = critique.instructions,
        );
        let revised = ctx.llm.complete(&prompt).await?;
        Ok(StateDelta {
            draft_answer: Some(revised.trim().to_string()),
            ..Default::default()
        })
    }

    async fn compose(
        &self,
        state: &AgentState,
        ctx: &NodeContext,
    ) -> Result<StateDelta, NodeError> {
        let context = ctx.prompt_context(state);
        let mut evidence_block = String::new();
        for (i, ev) in state.retrieved_context.iter().enumerate() {
            evidence_block.push_str(&format!("[{i}] ({}) {}\n", ev.source, ev.text));
        }
        let plan_line = if state.plan.is_empty() {
            String::new()
        } else {
            format!("Plan: {}\n", state.plan.join(" -> "))
        };
        let prompt = format!(
            "Answer the question using the numbered evidence when it is \
             relevant. Cite evidence by index.\n\
             Respond with JSON: {{\"answer\": ..., \"citations\": [indices]}}.\n\n\
             {context}Intent: {intent}\n{plan_line}Evidence:\n{evidence_block}\n\
             Question: {query}",
            intent = state.intent.as_deref().unwrap_or("answer the question"),
            query = state.query,
        );
        let response = ctx.llm.complete(&prompt).await?;
        let (answer, citations) = match super::parse_json_block::<ModelAnswer>(&response) {
            Some(parsed) => {
                let valid: Vec<usize> = parsed
                    .citations
                    .into_iter()
                    .filter(|i| *i < state.retrieved_context.len())
                    .collect();
                (parsed.answer, valid)
            }
            // Unstructured reply: take it verbatim and cite everything used.
            None => (
                response.trim().to_string(),
                (0..state.retrieved_context.len()).collect(),
            ),
        };
        Ok(StateDelta {
            draft_answer: Some(answer),
            citations: Some(citations),
            ..Default::default()
        })
    }
}

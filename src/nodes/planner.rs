//! Planner: name the intent and sketch the steps.

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::LlmError;
use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, StateDelta};

pub struct PlannerNode;

#[derive(Deserialize)]
struct ModelPlan {
    intent: String,
    #[serde(default)]
    plan: Vec<String>,
}

#[async_trait]
impl AgentNode for PlannerNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let context = ctx.prompt_context(state);
        let prompt = format!(
            "Analyze the user's intent and produce a short ordered plan for \
             answering the query.\n\
             Respond with JSON: {{\"intent\": ..., \"plan\": [step, ...]}}.\n\n\
             {context}Query: {query}",
            query = state.query
        );
        let parsed = match ctx.llm.complete(&prompt).await {
            Ok(response) => super::parse_json_block::<ModelPlan>(&response),
            Err(err) if err.retryable() => return Err(err.into()),
            Err(LlmError::Unconfigured | LlmError::Malformed(_) | LlmError::Unavailable(_)) => None,
        };
        // A missing plan is not worth failing the run over.
        let (intent, plan) = match parsed {
            Some(p) if !p.intent.is_empty() => (p.intent, p.plan),
            _ => (
                "answer the user's question".to_string(),
                vec![
                    "gather relevant context".to_string(),
                    "compose the answer".to_string(),
                ],
            ),
        };
        Ok(StateDelta {
            intent: Some(intent),
            plan: Some(plan),
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

    fn ctx(llm: ScriptedModel) -> NodeContext {
        NodeContext {
            request_id: "req".to_string(),
            session_id: "s".to_string(),
            stage: Stage::Planner,
            attempt: 0,
            llm: Arc::new(llm),
            tools: Arc::new(ToolAdapters::new(Duration::from_secs(1))),
            settings: Arc::new(Settings::default()),
        }
    }

    #[tokio::test]
    async fn model_plan_is_parsed() {
        let llm = ScriptedModel::with_responses([
            r#"{"intent": "compare prices", "plan": ["search", "compare", "answer"]}"#,
        ]);
        let delta = PlannerNode
            .run(&AgentState::new("q"), &ctx(llm))
            .await
            .unwrap();
        assert_eq!(delta.intent.as_deref(), Some("compare prices"));
        assert_eq!(delta.plan.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unparseable_plan_falls_back_to_default() {
        let llm = ScriptedModel::with_responses(["no structure at all"]);
        let delta = PlannerNode
            .run(&AgentState::new("q"), &ctx(llm))
            .await
            .unwrap();
        assert_eq!(delta.intent.as_deref(), Some("answer the user's question"));
        assert_eq!(delta.plan.unwrap().len(), 2);
    }
}

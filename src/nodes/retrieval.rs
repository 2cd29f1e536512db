//! Retrieval: execute the routed tool and collect evidence.
//!
//! The only node that reaches outside the process. Dispatches to the tool
//! adapters based on the routing decision; when internal retrieval comes
//! back empty and the fallback flag is on, it re-dispatches to web search
//! once and records the updated routing decision.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, RoutingDecision, StateDelta};
use crate::types::ToolKind;

pub struct RetrievalNode;

#[async_trait]
impl AgentNode for RetrievalNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let decision = state
            .routing_decision
            .as_ref()
            .ok_or(NodeError::MissingInput {
                what: "routing_decision",
            })?;

        let evidence = ctx
            .tools
            .run_tool(decision.tool, &state.query, decision.target_url.as_deref())
            .await?;
        info!(tool = %decision.tool, results = evidence.len(), "retrieval complete");

        let mut delta = StateDelta::default();
        if evidence.is_empty()
            && decision.tool == ToolKind::InternalRetrieval
            && ctx.settings.fallback_web_on_empty_retrieval
            && ctx.tools.configured(ToolKind::WebSearch)
        {
            warn!("internal retrieval returned nothing, falling back to web search");
            let fallback = ctx
                .tools
                .run_tool(ToolKind::WebSearch, &state.query, None)
                .await?;
            delta.routing_decision = Some(RoutingDecision::new(
                ToolKind::WebSearch,
                "internal retrieval was empty, fell back to web search",
            ));
            delta.retrieved_context = Some(fallback);
        } else {
            delta.retrieved_context = Some(evidence);
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::ScriptedModel;
    use crate::state::Evidence;
    use crate::tools::backends::{StaticRetriever, StaticSearch};
    use crate::tools::ToolAdapters;
    use crate::types::Stage;
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(tools: ToolAdapters, fallback: bool) -> NodeContext {
        let mut settings = Settings::default();
        settings.fallback_web_on_empty_retrieval = fallback;
        NodeContext {
            request_id: "req".to_string(),
            session_id: "s".to_string(),
            stage: Stage::Retrieval,
            attempt: 0,
            llm: Arc::new(ScriptedModel::new()),
            tools: Arc::new(tools),
            settings: Arc::new(settings),
        }
    }

    fn routed_state(tool: ToolKind) -> AgentState {
        let mut state = AgentState::new("anything about quasars");
        state.routing_decision = Some(RoutingDecision::new(tool, "test"));
        state
    }

    #[tokio::test]
    async fn empty_internal_retrieval_falls_back_to_web_search() {
        let tools = ToolAdapters::new(Duration::from_secs(1))
            .with_retriever(Arc::new(StaticRetriever::new(vec![])))
            .with_search(Arc::new(StaticSearch::new(vec![Evidence::new(
                "web fact", "web",
            )])));
        let delta = RetrievalNode
            .run(&routed_state(ToolKind::InternalRetrieval), &ctx(tools, true))
            .await
            .unwrap();
        assert_eq!(
            delta.routing_decision.unwrap().tool,
            ToolKind::WebSearch
        );
        assert_eq!(delta.retrieved_context.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fallback_respects_the_feature_flag() {
        let tools = ToolAdapters::new(Duration::from_secs(1))
            .with_retriever(Arc::new(StaticRetriever::new(vec![])))
            .with_search(Arc::new(StaticSearch::new(vec![Evidence::new(
                "web fact", "web",
            )])));
        let delta = RetrievalNode
            .run(&routed_state(ToolKind::InternalRetrieval), &ctx(tools, false))
            .await
            .unwrap();
        assert!(delta.routing_decision.is_none());
        assert!(delta.retrieved_context.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_routing_decision_is_an_input_error() {
        let tools = ToolAdapters::new(Duration::from_secs(1));
        let err = RetrievalNode
            .run(&AgentState::new("q"), &ctx(tools, true))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::MissingInput { .. }));
    }
}

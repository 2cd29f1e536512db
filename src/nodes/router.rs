//! Router: decide which tool serves the query.
//!
//! Cheap deterministic heuristics run first — an explicit URL, an arithmetic
//! expression, an explicit translation request, internal-document cues. Only
//! when none of them fire does the router spend a model call on
//! classification. Either way the decision lands in the closed
//! [`ToolKind`] set, never on a tool whose backend is unconfigured.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::llm::LlmError;
use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, RoutingDecision, StateDelta};
use crate::types::ToolKind;

/// Words that signal a question about internal documents.
const INTERNAL_CUES: [&str; 6] = [
    "internal",
    "knowledge base",
    "documentation",
    "handbook",
    "policy",
    "our docs",
];

pub struct RouterNode;

#[derive(Deserialize)]
struct ModelDecision {
    tool: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    target_url: Option<String>,
}

#[async_trait]
impl AgentNode for RouterNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let decision = match heuristic_route(state, ctx) {
            Some(decision) => decision,
            None => self.classify(state, ctx).await?,
        };
        debug!(tool = %decision.tool, "routing decision");
        Ok(StateDelta {
            routing_decision: Some(decision),
            ..Default::default()
        })
    }
}

impl RouterNode {
    async fn classify(
        &self,
        state: &AgentState,
        ctx: &NodeContext,
    ) -> Result<RoutingDecision, NodeError> {
        let context = ctx.prompt_context(state);
        let prompt = format!(
            "You are a routing agent. Choose exactly one tool for the query.\n\
             Tools: web_search (current events, open questions), \
             targeted_crawl (a specific URL is named), \
             internal_retrieval (internal documents or book/document titles), \
             calculator (arithmetic), translate (translation requests), \
             direct_answer (answer from model knowledge).\n\
             Respond with JSON: {{\"tool\": ..., \"reasoning\": ..., \"target_url\": null}}.\n\n\
             {context}Query: {query}",
            query = state.query
        );
        let decision = match ctx.llm.complete(&prompt).await {
            Ok(response) => parse_decision(&response),
            // No model or a garbled reply: answer directly rather than guess.
            Err(LlmError::Unconfigured) | Err(LlmError::Malformed(_)) => None,
            Err(err) => return Err(err.into()),
        };
        let decision = decision.unwrap_or_else(|| {
            RoutingDecision::new(ToolKind::DirectAnswer, "insufficient routing confidence")
        });
        Ok(sanitize(decision, ctx))
    }
}

fn parse_decision(response: &str) -> Option<RoutingDecision> {
    let parsed: ModelDecision = super::parse_json_block(response)?;
    let tool = ToolKind::parse(&parsed.tool)?;
    let mut decision = RoutingDecision::new(tool, parsed.reasoning);
    decision.target_url = parsed.target_url.filter(|u| is_url(u));
    Some(decision)
}

/// Deterministic routing for the cases that need no model.
fn heuristic_route(state: &AgentState, ctx: &NodeContext) -> Option<RoutingDecision> {
    let query = state.query.trim();
    let lowered = query.to_lowercase();

    if let Some(url) = query.split_whitespace().find(|token| is_url(token)) {
        let decision = RoutingDecision::new(ToolKind::TargetedCrawl, "query names an explicit URL")
            .with_target(url.trim_end_matches(['.', ',', ')']));
        return Some(sanitize(decision, ctx));
    }
    if crate::tools::calculator::looks_like_expression(query) {
        return Some(RoutingDecision::new(
            ToolKind::Calculator,
            "query is an arithmetic expression",
        ));
    }
    if lowered.starts_with("translate") {
        return Some(RoutingDecision::new(
            ToolKind::Translate,
            "explicit translation request",
        ));
    }
    if INTERNAL_CUES.iter().any(|cue| lowered.contains(cue)) || lowered.contains('"') {
        let decision = RoutingDecision::new(
            ToolKind::InternalRetrieval,
            "query references internal documents",
        );
        return Some(sanitize(decision, ctx));
    }
    None
}

/// Keep the decision inside what this deployment can actually execute.
///
/// An unconfigured backend is downgraded: crawl and retrieval fall back to
/// web search when available, and anything unservable becomes a direct
/// answer. A crawl decision without a usable URL falls back to search too.
fn sanitize(mut decision: RoutingDecision, ctx: &NodeContext) -> RoutingDecision {
    if decision.tool == ToolKind::TargetedCrawl && decision.target_url.is_none() {
        decision = RoutingDecision::new(ToolKind::WebSearch, "crawl target missing, searching instead");
    }
    if ctx.tools.configured(decision.tool) {
        return decision;
    }
    if ctx.tools.configured(ToolKind::WebSearch)
        && matches!(
            decision.tool,
            ToolKind::TargetedCrawl | ToolKind::InternalRetrieval
        )
    {
        return RoutingDecision::new(
            ToolKind::WebSearch,
            format!("{} backend unavailable, searching instead", decision.tool),
        );
    }
    RoutingDecision::new(
        ToolKind::DirectAnswer,
        format!("{} backend unavailable", decision.tool),
    )
}

fn is_url(token: &str) -> bool {
    (token.starts_with("http://") || token.starts_with("https://")) && token.len() > 10
}

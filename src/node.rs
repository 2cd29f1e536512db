//! The node seam: one trait per pipeline stage.
//!
//! An [`AgentNode`] maps the current [`AgentState`] to a [`StateDelta`] —
//! nothing else. All the services a node may touch (language model, tool
//! adapters, settings) arrive through the per-invocation [`NodeContext`],
//! injected by the runtime, so nodes stay stateless and deterministic given
//! a deterministic model.
//!
//! Failures are values: a node returns [`NodeError`] and the runtime decides
//! whether to retry (bounded, for retryable errors) or route the run to the
//! error terminal.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::config::Settings;
use crate::llm::{LanguageModel, LlmError};
use crate::state::{AgentState, StateDelta};
use crate::tools::{ToolAdapters, ToolError};
use crate::types::Stage;

/// Execution context handed to a node for one invocation.
#[derive(Clone)]
pub struct NodeContext {
    pub request_id: String,
    pub session_id: String,
    /// The stage being executed (also the name subscribers see).
    pub stage: Stage,
    /// 0 on first execution, 1 on a retry after a retryable failure.
    pub attempt: u32,
    pub llm: Arc<dyn LanguageModel>,
    pub tools: Arc<ToolAdapters>,
    pub settings: Arc<Settings>,
}

impl NodeContext {
    /// The prompt context for this state: summary plus recent tail.
    #[must_use]
    pub fn prompt_context(&self, state: &AgentState) -> String {
        state.prompt_context(self.settings.keep_recent_messages)
    }
}

/// Errors a node can fail with.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    #[error(transparent)]
    #[diagnostic(code(askgraph::node::llm))]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(code(askgraph::node::tool))]
    Tool(#[from] ToolError),

    /// A prior stage did not produce data this node requires.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(askgraph::node::missing_input),
        help("Check the transition table: an earlier stage should have set this field.")
    )]
    MissingInput { what: &'static str },

    /// The node exceeded its execution budget. Raised by the runtime.
    #[error("stage timed out after {seconds}s")]
    #[diagnostic(code(askgraph::node::timeout))]
    Timeout { seconds: u64 },

    #[error("invalid node input: {0}")]
    #[diagnostic(code(askgraph::node::invalid))]
    Invalid(String),
}

impl NodeError {
    /// Whether re-executing the node could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            NodeError::Llm(e) => e.retryable(),
            NodeError::Tool(e) => e.retryable(),
            NodeError::Timeout { .. } => true,
            NodeError::MissingInput { .. } | NodeError::Invalid(_) => false,
        }
    }
}

/// One stage of the pipeline: state in, state-delta out.
#[async_trait]
pub trait AgentNode: Send + Sync {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_cause() {
        assert!(NodeError::Timeout { seconds: 60 }.retryable());
        assert!(NodeError::Llm(LlmError::Unavailable("503".into())).retryable());
        assert!(!NodeError::Llm(LlmError::Malformed("x".into())).retryable());
        assert!(!NodeError::MissingInput { what: "draft_answer" }.retryable());
        assert!(NodeError::Tool(ToolError::Timeout {
            tool: "web_search",
            seconds: 1
        })
        .retryable());
    }
}

//! Summarize: refresh the session's rolling summary.
//!
//! Runs at the end of every graph pass but only does work once the history
//! crosses the summarization threshold. A summarizer failure is soft: the
//! run keeps its answer and the old summary stays in place.

use async_trait::async_trait;
use tracing::warn;

use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, StateDelta};
use crate::summarizer::Summarizer;

pub struct SummarizeNode;

#[async_trait]
impl AgentNode for SummarizeNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let summarizer = Summarizer::new(ctx.llm.clone(), ctx.settings.clone());
        match summarizer.summarize(&state.chat_history, &state.summary).await {
            Ok(Some(report)) => Ok(StateDelta {
                summary: Some(report.summary),
                ..Default::default()
            }),
            Ok(None) => Ok(StateDelta::default()),
            Err(err) => {
                warn!(error = %err, "summarization failed, keeping previous summary");
                Ok(StateDelta::default())
            }
        }
    }
}

//! The graph executor.
//!
//! Walks the transition table from `router` to `finalize`, running one node
//! at a time. The executor owns the cross-cutting concerns so nodes don't
//! have to: per-stage timeouts, one bounded retry for retryable failures,
//! per-node event emission, and the checkpoint hook.
//!
//! Execution is strictly sequential within a run; concurrency lives in the
//! worker layer, where independent jobs run on independent workers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::events::{EventEmitter, StreamEvent};
use crate::llm::LanguageModel;
use crate::node::{AgentNode, NodeContext, NodeError};
use crate::nodes;
use crate::state::{AgentState, StageError};
use crate::tools::ToolAdapters;
use crate::types::Stage;

use super::transitions::{next_stage, Transition};

/// Re-executions allowed per stage after a retryable failure.
const NODE_ATTEMPTS: u32 = 2;
/// Pause before re-executing a failed node.
const NODE_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Receives the state after each node for opportunistic persistence.
///
/// Offers are rate-limited by construction (one per node) and best-effort;
/// the worker still persists the canonical checkpoint at end of run.
#[async_trait]
pub trait CheckpointHook: Send + Sync {
    async fn offer(&self, state: &AgentState);
}

/// Per-run services injected into node contexts.
///
/// A fresh context is built per run — language model handles are never
/// shared process-globals.
pub struct RunContext {
    pub request_id: String,
    pub session_id: String,
    pub llm: Arc<dyn LanguageModel>,
    pub tools: Arc<ToolAdapters>,
    pub emitter: Arc<dyn EventEmitter>,
    pub checkpoint: Option<Arc<dyn CheckpointHook>>,
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed {
        stage: Stage,
        message: String,
        retryable: bool,
    },
}

/// Final state plus how the run got there. The state is returned even on
/// failure so the worker can persist a partial checkpoint.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub state: AgentState,
    pub outcome: RunOutcome,
}

impl RunReport {
    #[must_use]
    pub fn completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// The compiled pipeline: a node per stage plus the shared settings.
pub struct GraphRuntime {
    registry: FxHashMap<Stage, Arc<dyn AgentNode>>,
    settings: Arc<Settings>,
}

impl GraphRuntime {
    /// The standard pipeline with the stock node implementations.
    #[must_use]
    pub fn standard(settings: Arc<Settings>) -> Self {
        let mut registry: FxHashMap<Stage, Arc<dyn AgentNode>> = FxHashMap::default();
        registry.insert(Stage::Router, Arc::new(nodes::RouterNode));
        registry.insert(Stage::Planner, Arc::new(nodes::PlannerNode));
        registry.insert(Stage::Retrieval, Arc::new(nodes::RetrievalNode));
        registry.insert(Stage::Generator, Arc::new(nodes::GeneratorNode));
        registry.insert(Stage::Critic, Arc::new(nodes::CriticNode));
        registry.insert(Stage::Translator, Arc::new(nodes::TranslatorNode));
        registry.insert(Stage::Summarize, Arc::new(nodes::SummarizeNode));
        registry.insert(Stage::Finalize, Arc::new(nodes::FinalizeNode));
        debug_assert!(Stage::ALL.iter().all(|s| registry.contains_key(s)));
        Self { registry, settings }
    }

    /// Swap one stage's node. Test instrumentation and extension point.
    #[must_use]
    pub fn with_node(mut self, stage: Stage, node: Arc<dyn AgentNode>) -> Self {
        self.registry.insert(stage, node);
        self
    }

    /// Drive the state machine from `router` to a terminal.
    ///
    /// Emits one `{"node", "state"}` event per executed node. Terminal
    /// events (`complete`/`error`) are the worker's to publish, after it has
    /// settled persistence.
    #[instrument(skip(self, state, ctx), fields(request_id = %ctx.request_id))]
    pub async fn run(&self, mut state: AgentState, ctx: &RunContext) -> RunReport {
        let mut stage = Stage::Router;
        loop {
            let delta = match self.run_node(stage, &state, ctx).await {
                Ok(delta) => delta,
                Err(err) => {
                    let stage_error = StageError {
                        stage: stage.as_str().to_string(),
                        message: err.to_string(),
                        retryable: err.retryable(),
                    };
                    warn!(stage = %stage, error = %err, "stage failed, run aborts");
                    state.error = Some(stage_error.clone());
                    return RunReport {
                        state,
                        outcome: RunOutcome::Failed {
                            stage,
                            message: stage_error.message,
                            retryable: stage_error.retryable,
                        },
                    };
                }
            };

            let diff = serde_json::to_value(&delta).unwrap_or_default();
            state.apply(delta);
            ctx.emitter.emit(StreamEvent::node(stage, diff));
            if let Some(hook) = &ctx.checkpoint {
                hook.offer(&state).await;
            }

            match next_stage(stage, &state, &self.settings) {
                Transition::Next(next) => stage = next,
                Transition::Revise => {
                    // The edge owns the increment, so the cap holds by
                    // construction.
                    state.revision_count += 1;
                    debug!(revision = state.revision_count, "taking revision edge");
                    stage = Stage::Generator;
                }
                Transition::Done => {
                    return RunReport {
                        state,
                        outcome: RunOutcome::Completed,
                    };
                }
            }
        }
    }

    async fn run_node(
        &self,
        stage: Stage,
        state: &AgentState,
        ctx: &RunContext,
    ) -> Result<crate::state::StateDelta, NodeError> {
        let node = self
            .registry
            .get(&stage)
            .ok_or(NodeError::MissingInput {
                what: "node registration",
            })?
            .clone();
        let budget = self.settings.node_timeout(stage);

        let mut attempt = 0;
        loop {
            let node_ctx = NodeContext {
                request_id: ctx.request_id.clone(),
                session_id: ctx.session_id.clone(),
                stage,
                attempt,
                llm: ctx.llm.clone(),
                tools: ctx.tools.clone(),
                settings: self.settings.clone(),
            };
            let result = match tokio::time::timeout(budget, node.run(state, &node_ctx)).await {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout {
                    seconds: budget.as_secs(),
                }),
            };
            match result {
                Ok(delta) => return Ok(delta),
                Err(err) if err.retryable() && attempt + 1 < NODE_ATTEMPTS => {
                    attempt += 1;
                    warn!(stage = %stage, attempt, error = %err, "node failed, retrying");
                    tokio::time::sleep(NODE_RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

//! The worker: claims jobs, runs the graph, publishes the terminal event.
//!
//! Each worker processes one job at a time; scale comes from running several
//! workers against the shared broker. Within a job the pipeline is strictly
//! sequential.
//!
//! The worker — not the graph runtime — owns the terminal event, because the
//! terminal depends on persistence: a run whose checkpoint write fails ends
//! in `error` with stage `persist`, never in `complete`. A failed run still
//! persists a partial checkpoint when retrieval or a later stage had
//! produced something worth keeping, and it never appends an empty
//! assistant message to the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::broker::{Broker, Job};
use crate::config::Settings;
use crate::events::{EventEmitter, StreamEvent};
use crate::graph::{CheckpointHook, GraphRuntime, RunContext, RunOutcome};
use crate::llm::LanguageModel;
use crate::message::Message;
use crate::session::SessionService;
use crate::state::AgentState;
use crate::tools::ToolAdapters;

/// Emitter that forwards run events onto the request's broker channel.
pub struct BrokerEmitter {
    broker: Broker,
    request_id: String,
}

impl BrokerEmitter {
    #[must_use]
    pub fn new(broker: Broker, request_id: impl Into<String>) -> Self {
        Self {
            broker,
            request_id: request_id.into(),
        }
    }
}

impl EventEmitter for BrokerEmitter {
    fn emit(&self, event: StreamEvent) {
        if let Err(err) = self.broker.publish(&self.request_id, event) {
            warn!(request_id = %self.request_id, error = %err, "event publish failed");
        }
    }
}

/// Saves an intermediate checkpoint after each node. Wired in only when
/// `checkpoint_each_node` is set; the end-of-run save is unconditional.
struct SessionCheckpointHook {
    sessions: SessionService,
    session_id: String,
}

#[async_trait]
impl CheckpointHook for SessionCheckpointHook {
    async fn offer(&self, state: &AgentState) {
        if let Err(err) = self.sessions.save_state(&self.session_id, state.clone()).await {
            warn!(session_id = %self.session_id, error = %err, "intermediate checkpoint skipped");
        }
    }
}

pub struct Worker {
    broker: Broker,
    sessions: SessionService,
    runtime: Arc<GraphRuntime>,
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolAdapters>,
    settings: Arc<Settings>,
}

impl Worker {
    #[must_use]
    pub fn new(
        broker: Broker,
        sessions: SessionService,
        runtime: Arc<GraphRuntime>,
        llm: Arc<dyn LanguageModel>,
        tools: Arc<ToolAdapters>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            broker,
            sessions,
            runtime,
            llm,
            tools,
            settings,
        }
    }

    /// Claim-and-process loop; returns when `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                claimed = self.broker.claim(self.settings.t_claim) => {
                    if let Some(job) = claimed {
                        self.process(job).await;
                    }
                }
            }
        }
    }

    /// Run one job end to end, publishing exactly one terminal event.
    #[instrument(skip(self, job), fields(request_id = %job.request_id, session_id = %job.session_id))]
    pub async fn process(&self, job: Job) {
        let emitter = BrokerEmitter::new(self.broker.clone(), job.request_id.clone());
        emitter.emit(StreamEvent::connected(&job.request_id));

        let prior = match self.sessions.get_state(&job.session_id).await {
            Ok(prior) => prior,
            Err(err) => {
                emitter.emit(StreamEvent::error("load", err.to_string()));
                return;
            }
        };
        let (history, summary) = prior
            .map(|state| (state.chat_history, state.summary))
            .unwrap_or_default();
        let state = AgentState::for_turn(
            job.query.clone(),
            history,
            summary,
            job.target_language.clone(),
        );

        let checkpoint: Option<Arc<dyn CheckpointHook>> = if self.settings.checkpoint_each_node {
            Some(Arc::new(SessionCheckpointHook {
                sessions: self.sessions.clone(),
                session_id: job.session_id.clone(),
            }))
        } else {
            None
        };
        let ctx = RunContext {
            request_id: job.request_id.clone(),
            session_id: job.session_id.clone(),
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            emitter: Arc::new(BrokerEmitter::new(
                self.broker.clone(),
                job.request_id.clone(),
            )),
            checkpoint,
        };

        let report = match tokio::time::timeout(self.settings.t_job, self.runtime.run(state, &ctx))
            .await
        {
            Ok(report) => report,
            Err(_) => {
                warn!("job deadline exceeded");
                emitter.emit(StreamEvent::error("job", "job deadline exceeded"));
                return;
            }
        };

        match report.outcome {
            RunOutcome::Completed => {
                let mut state = report.state;
                let answer = state
                    .final_answer
                    .clone()
                    .unwrap_or_else(|| crate::nodes::finalize::APOLOGY_STUB.to_string());
                state.chat_history.push(Message::user(&job.query));
                state.chat_history.push(Message::assistant(&answer));

                if let Err(err) = self.sessions.save_state(&job.session_id, state.clone()).await {
                    warn!(error = %err, "final checkpoint failed");
                    emitter.emit(StreamEvent::error("persist", err.to_string()));
                    return;
                }
                info!("job complete");
                emitter.emit(StreamEvent::complete(&state));
            }
            RunOutcome::Failed { stage, message, .. } => {
                // Keep what retrieval and later stages produced; the session
                // transcript itself is not extended with a failed turn.
                let has_progress = !report.state.retrieved_context.is_empty()
                    || report.state.draft_answer.is_some();
                if has_progress {
                    if let Err(err) = self
                        .sessions
                        .save_state(&job.session_id, report.state.clone())
                        .await
                    {
                        warn!(error = %err, "partial checkpoint failed");
                    }
                }
                emitter.emit(StreamEvent::error(stage.as_str(), message));
            }
        }
    }
}

//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use askgraph::broker::Broker;
use askgraph::config::Settings;
use askgraph::events::CollectingEmitter;
use askgraph::graph::{GraphRuntime, RunContext};
use askgraph::llm::{LanguageModel, ScriptedModel};
use askgraph::server::AppContext;
use askgraph::session::SessionService;
use askgraph::state::Evidence;
use askgraph::store::MemoryStore;
use askgraph::tools::backends::{StaticRetriever, StaticSearch};
use askgraph::tools::ToolAdapters;
use askgraph::worker::Worker;

pub fn settings() -> Arc<Settings> {
    Arc::new(Settings::default())
}

/// Adapters with a canned web-search backend.
pub fn tools_with_search() -> Arc<ToolAdapters> {
    Arc::new(
        ToolAdapters::new(Duration::from_secs(5)).with_search(Arc::new(StaticSearch::new(vec![
            Evidence::new("a relevant web fact", "https://example.com/fact"),
        ]))),
    )
}

/// Adapters where internal retrieval finds nothing but web search works —
/// the fallback configuration.
pub fn tools_with_empty_retriever() -> Arc<ToolAdapters> {
    Arc::new(
        ToolAdapters::new(Duration::from_secs(5))
            .with_retriever(Arc::new(StaticRetriever::new(vec![])))
            .with_search(Arc::new(StaticSearch::new(vec![Evidence::new(
                "a relevant web fact",
                "https://example.com/fact",
            )]))),
    )
}

pub fn bare_tools() -> Arc<ToolAdapters> {
    Arc::new(ToolAdapters::new(Duration::from_secs(5)))
}

/// A run context collecting events in memory.
pub fn run_context(
    llm: Arc<dyn LanguageModel>,
    tools: Arc<ToolAdapters>,
) -> (RunContext, CollectingEmitter) {
    let emitter = CollectingEmitter::new();
    let ctx = RunContext {
        request_id: "req-test".to_string(),
        session_id: "session-test".to_string(),
        llm,
        tools,
        emitter: Arc::new(emitter.clone()),
        checkpoint: None,
    };
    (ctx, emitter)
}

pub struct Harness {
    pub broker: Broker,
    pub sessions: SessionService,
    pub store: Arc<MemoryStore>,
    pub worker: Worker,
}

/// Broker + in-memory store + worker wired together.
pub fn harness(llm: Arc<dyn LanguageModel>, tools: Arc<ToolAdapters>) -> Harness {
    let settings = settings();
    let store = Arc::new(MemoryStore::new());
    let sessions = SessionService::new(store.clone());
    let broker = Broker::from_settings(&settings);
    let runtime = Arc::new(GraphRuntime::standard(settings.clone()));
    let worker = Worker::new(
        broker.clone(),
        sessions.clone(),
        runtime,
        llm,
        tools,
        settings,
    );
    Harness {
        broker,
        sessions,
        store,
        worker,
    }
}

/// Full API context over in-memory services.
pub fn app_context() -> AppContext {
    let settings = settings();
    let store = Arc::new(MemoryStore::new());
    AppContext {
        settings: settings.clone(),
        broker: Broker::from_settings(&settings),
        sessions: SessionService::new(store.clone()),
        feedback: store,
        llm: Arc::new(ScriptedModel::new()),
        tools: bare_tools(),
    }
}

pub fn needs_revision_json() -> &'static str {
    r#"{"verdict": "needs_revision", "reasons": ["incomplete"], "instructions": "cover the second point"}"#
}

pub fn approved_json() -> &'static str {
    r#"{"verdict": "approved", "reasons": [], "instructions": ""}"#
}

//! ```text
//! POST /api/queue ─► Broker::queue ─► Worker ─► GraphRuntime ─► nodes
//!                                      │            │             │
//!                                      │            │             ├─► ToolAdapters
//!                                      │            │             └─► LanguageModel
//!                                      │            └─► StateDelta → AgentState
//!                                      │
//!                                      ├─► SessionService ─► CheckpointStore (SQLite / InMemory)
//!                                      └─► Broker::hub ─► GET /api/stream/{request_id} (SSE)
//! ```
//!
//! Askgraph is an asynchronous question-answering orchestrator: user queries
//! are enqueued as jobs, picked up by workers, and driven through a fixed
//! directed graph of agent nodes (router, planner, retrieval, generator,
//! critic, translator, summarize, finalize) with a bounded revision loop.
//! Progress streams back to HTTP subscribers over SSE, and conversation
//! state is checkpointed per session.

pub mod broker;
pub mod config;
pub mod events;
pub mod graph;
pub mod llm;
pub mod message;
pub mod node;
pub mod nodes;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod summarizer;
pub mod tools;
pub mod types;
pub mod worker;

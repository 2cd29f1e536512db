//! Environment-driven configuration.
//!
//! All tunables live in one [`Settings`] struct resolved once at startup
//! (and once per test fixture). Values come from the process environment,
//! with `.env` loaded via `dotenvy` when present.

use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving [`Settings`] from the environment.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    #[diagnostic(
        code(askgraph::config::invalid),
        help("Unset the variable to fall back to its default.")
    )]
    Invalid { var: &'static str, value: String },
}

/// Resolved runtime configuration.
///
/// Field defaults match the documented operational defaults; every field can
/// be overridden through the environment variable of the same (upper-cased)
/// name.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Model name handed to the language model client.
    pub llm_model: String,
    /// Cap on generator/critic revision cycles per run.
    pub max_revisions: u32,
    /// History length at which summarization switches to hierarchical mode.
    pub hierarchical_threshold: usize,
    /// Messages per chunk in hierarchical summarization.
    pub chunk_size: usize,
    /// Trailing messages never folded into the summary.
    pub keep_recent_messages: usize,
    /// Upper bound on summary length, in characters.
    pub summary_char_cap: usize,
    /// How long a worker blocks waiting for a job.
    pub t_claim: Duration,
    /// Default per-node execution budget.
    pub t_node: Duration,
    /// Retrieval node budget (external backends are slow).
    pub t_node_retrieval: Duration,
    /// Generator node budget (long completions).
    pub t_node_generator: Duration,
    /// Whole-job deadline.
    pub t_job: Duration,
    /// How long terminal events stay replayable for late subscribers.
    pub sub_grace: Duration,
    /// Events retained per request for replay.
    pub replay_buffer: usize,
    /// Checkpoint/feedback store URL ("sqlite://..." or empty for in-memory).
    pub store_url: String,
    /// Web search API key; search stays unconfigured without it.
    pub web_search_key: Option<String>,
    /// Path to the internal retriever index; retrieval stays unconfigured
    /// without it.
    pub retriever_index_path: Option<String>,
    /// Re-dispatch to web search when internal retrieval comes back empty.
    pub fallback_web_on_empty_retrieval: bool,
    /// Language answers are produced in unless a job overrides it.
    pub base_language: String,
    /// Save a checkpoint after every node, not just at end of run.
    pub checkpoint_each_node: bool,
    /// HTTP bind address.
    pub bind_addr: String,
    /// Number of worker loops to spawn in-process.
    pub worker_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4o-mini".to_string(),
            max_revisions: 2,
            hierarchical_threshold: 100,
            chunk_size: 20,
            keep_recent_messages: 4,
            summary_char_cap: 4096,
            t_claim: Duration::from_secs(5),
            t_node: Duration::from_secs(60),
            t_node_retrieval: Duration::from_secs(120),
            t_node_generator: Duration::from_secs(180),
            t_job: Duration::from_secs(600),
            sub_grace: Duration::from_secs(300),
            replay_buffer: 64,
            store_url: String::new(),
            web_search_key: None,
            retriever_index_path: None,
            fallback_web_on_empty_retrieval: true,
            base_language: "English".to_string(),
            checkpoint_each_node: false,
            bind_addr: "127.0.0.1:8000".to_string(),
            worker_count: 2,
        }
    }
}

impl Settings {
    /// Resolve settings from the environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut s = Settings::default();

        if let Ok(v) = std::env::var("LLM_MODEL") {
            s.llm_model = v;
        }
        s.max_revisions = parse_env("MAX_REVISIONS", s.max_revisions)?;
        s.hierarchical_threshold =
            parse_env("HIERARCHICAL_THRESHOLD", s.hierarchical_threshold)?;
        s.chunk_size = parse_env("CHUNK_SIZE", s.chunk_size)?;
        s.keep_recent_messages = parse_env("KEEP_RECENT_MESSAGES", s.keep_recent_messages)?;
        s.summary_char_cap = parse_env("SUMMARY_CHAR_CAP", s.summary_char_cap)?;
        s.t_claim = parse_secs("T_CLAIM", s.t_claim)?;
        s.t_node = parse_secs("T_NODE", s.t_node)?;
        s.t_node_retrieval = parse_secs("T_NODE_RETRIEVAL", s.t_node_retrieval)?;
        s.t_node_generator = parse_secs("T_NODE_GENERATOR", s.t_node_generator)?;
        s.t_job = parse_secs("T_JOB", s.t_job)?;
        s.sub_grace = parse_secs("SUB_GRACE", s.sub_grace)?;
        s.replay_buffer = parse_env("REPLAY_BUFFER", s.replay_buffer)?;
        if let Ok(v) = std::env::var("STORE_URL") {
            s.store_url = v;
        }
        s.web_search_key = std::env::var("WEB_SEARCH_KEY").ok().filter(|v| !v.is_empty());
        s.retriever_index_path = std::env::var("RETRIEVER_INDEX_PATH")
            .ok()
            .filter(|v| !v.is_empty());
        s.fallback_web_on_empty_retrieval = parse_env(
            "FALLBACK_WEB_ON_EMPTY_RETRIEVAL",
            s.fallback_web_on_empty_retrieval,
        )?;
        if let Ok(v) = std::env::var("BASE_LANGUAGE") {
            s.base_language = v;
        }
        s.checkpoint_each_node = parse_env("CHECKPOINT_EACH_NODE", s.checkpoint_each_node)?;
        if let Ok(v) = std::env::var("BIND_ADDR") {
            s.bind_addr = v;
        }
        s.worker_count = parse_env("WORKER_COUNT", s.worker_count)?;

        Ok(s)
    }

    /// Per-stage execution budget; retrieval and generator get wider windows.
    #[must_use]
    pub fn node_timeout(&self, stage: crate::types::Stage) -> Duration {
        match stage {
            crate::types::Stage::Retrieval => self.t_node_retrieval,
            crate::types::Stage::Generator => self.t_node_generator,
            _ => self.t_node,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_env(var, default.as_secs())?))
}

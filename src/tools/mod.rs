//! Tool adapters: one uniform seam over the external backends.
//!
//! The retrieval and generator nodes never talk to a backend directly; they
//! call [`ToolAdapters::run_tool`] with a [`ToolKind`](crate::types::ToolKind)
//! and get back normalized [`Evidence`]. Each call is bounded by a timeout
//! and transient failures are retried with exponential backoff before being
//! surfaced.
//!
//! Backends are stateless trait objects ([`SearchBackend`],
//! [`RetrieverBackend`]); an unconfigured backend reports
//! [`ToolError::NeedsConfiguration`], which the router must avoid choosing.
//! The calculator is built in and needs no backend.

pub mod backends;
pub mod calculator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tracing::warn;

use crate::config::Settings;
use crate::state::Evidence;
use crate::types::ToolKind;

/// Retries after a transient failure, before giving up.
const MAX_RETRIES: u32 = 2;
/// First backoff step; grows to 800 ms on the second retry.
const BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Errors surfaced by tool execution.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// The backend for this tool is not configured in this deployment.
    #[error("tool {tool} is not configured")]
    #[diagnostic(
        code(askgraph::tools::needs_configuration),
        help("Configure the backend, or let the router avoid this tool.")
    )]
    NeedsConfiguration { tool: &'static str },

    /// Backend-side failure that may clear on retry.
    #[error("tool {tool} failed: {message}")]
    #[diagnostic(code(askgraph::tools::transient))]
    Transient { tool: &'static str, message: String },

    /// The call exceeded its budget.
    #[error("tool {tool} timed out after {seconds}s")]
    #[diagnostic(code(askgraph::tools::timeout))]
    Timeout { tool: &'static str, seconds: u64 },

    /// The input can never succeed (bad expression, missing URL).
    #[error("invalid tool input: {0}")]
    #[diagnostic(code(askgraph::tools::invalid))]
    Invalid(String),
}

impl ToolError {
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, ToolError::Transient { .. } | ToolError::Timeout { .. })
    }
}

/// Web-facing backend: open search plus fetching one named page.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, ToolError>;
    async fn fetch(&self, url: &str) -> Result<Vec<Evidence>, ToolError>;
}

/// Internal document index backend.
#[async_trait]
pub trait RetrieverBackend: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Evidence>, ToolError>;
}

/// Uniform dispatch over the configured backends.
pub struct ToolAdapters {
    search: Option<Arc<dyn SearchBackend>>,
    retriever: Option<Arc<dyn RetrieverBackend>>,
    call_timeout: Duration,
    max_results: usize,
}

impl ToolAdapters {
    /// Adapters with no external backends configured.
    #[must_use]
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            search: None,
            retriever: None,
            call_timeout,
            max_results: 5,
        }
    }

    /// Wire up backends according to settings. The concrete search/retriever
    /// clients live outside this crate; deployments register them through
    /// [`with_search`](Self::with_search) and
    /// [`with_retriever`](Self::with_retriever) after construction.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.t_node_retrieval)
    }

    #[must_use]
    pub fn with_search(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    #[must_use]
    pub fn with_retriever(mut self, backend: Arc<dyn RetrieverBackend>) -> Self {
        self.retriever = Some(backend);
        self
    }

    /// Whether the backend behind `kind` is available. The router consults
    /// this before committing to a tool; `/health` reports it.
    #[must_use]
    pub fn configured(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::WebSearch | ToolKind::TargetedCrawl => self.search.is_some(),
            ToolKind::InternalRetrieval => self.retriever.is_some(),
            ToolKind::Calculator | ToolKind::Translate | ToolKind::DirectAnswer => true,
        }
    }

    /// Execute one tool call: timeout-bounded, transient failures retried
    /// with exponential backoff.
    pub async fn run_tool(
        &self,
        kind: ToolKind,
        query: &str,
        target_url: Option<&str>,
    ) -> Result<Vec<Evidence>, ToolError> {
        match kind {
            ToolKind::Calculator => {
                let answer = calculator::answer(query)?;
                Ok(vec![Evidence::new(
                    format!("Calculation result: {answer}"),
                    "calculator",
                )])
            }
            // No backend involved; the generator and translator handle these.
            ToolKind::Translate | ToolKind::DirectAnswer => Ok(Vec::new()),
            ToolKind::WebSearch => {
                let backend = self.search.clone().ok_or(ToolError::NeedsConfiguration {
                    tool: "web_search",
                })?;
                let query = query.to_string();
                let max = self.max_results;
                self.with_retry("web_search", || {
                    let backend = backend.clone();
                    let query = query.clone();
                    async move { backend.search(&query, max).await }
                })
                .await
            }
            ToolKind::TargetedCrawl => {
                let backend = self.search.clone().ok_or(ToolError::NeedsConfiguration {
                    tool: "targeted_crawl",
                })?;
                let url = target_url
                    .ok_or_else(|| ToolError::Invalid("targeted_crawl needs a URL".to_string()))?
                    .to_string();
                self.with_retry("targeted_crawl", || {
                    let backend = backend.clone();
                    let url = url.clone();
                    async move { backend.fetch(&url).await }
                })
                .await
            }
            ToolKind::InternalRetrieval => {
                let backend = self
                    .retriever
                    .clone()
                    .ok_or(ToolError::NeedsConfiguration {
                        tool: "internal_retrieval",
                    })?;
                let query = query.to_string();
                let max = self.max_results;
                self.with_retry("internal_retrieval", || {
                    let backend = backend.clone();
                    let query = query.clone();
                    async move { backend.retrieve(&query, max).await }
                })
                .await
            }
        }
    }

    async fn with_retry<F, Fut>(
        &self,
        tool: &'static str,
        mut call: F,
    ) -> Result<Vec<Evidence>, ToolError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Evidence>, ToolError>>,
    {
        let mut backoff = BACKOFF_BASE;
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool,
                    seconds: self.call_timeout.as_secs(),
                }),
            };
            match outcome {
                Ok(evidence) => return Ok(evidence),
                Err(err) if err.retryable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(tool, attempt, error = %err, "tool call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 4;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

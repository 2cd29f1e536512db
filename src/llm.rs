//! Language model client abstraction.
//!
//! The orchestrator never talks to a provider directly; nodes receive an
//! `Arc<dyn LanguageModel>` injected per run. The concrete provider client
//! lives outside this crate — what ships here is the seam plus two
//! implementations: [`UnconfiguredModel`] (fails fast, keeps the health
//! endpoint honest) and [`ScriptedModel`] (deterministic, drives tests).

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors surfaced by a language model client.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    /// No client is configured for this deployment.
    #[error("language model not configured")]
    #[diagnostic(
        code(askgraph::llm::unconfigured),
        help("Set the provider credentials, or route queries that need no model.")
    )]
    Unconfigured,

    /// Provider-side failure (timeout, 5xx). Worth retrying.
    #[error("language model unavailable: {0}")]
    #[diagnostic(code(askgraph::llm::unavailable))]
    Unavailable(String),

    /// The model answered but the response could not be used.
    #[error("malformed model response: {0}")]
    #[diagnostic(code(askgraph::llm::malformed))]
    Malformed(String),
}

impl LlmError {
    /// Transient failures may be retried; the rest may not.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, LlmError::Unavailable(_))
    }
}

/// A completion-style language model client.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt into free text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Whether a real provider is wired up. Reported by `/health`.
    fn configured(&self) -> bool {
        true
    }
}

/// Placeholder client for deployments without provider credentials.
///
/// Every call fails with [`LlmError::Unconfigured`]; routing still works for
/// queries the heuristics can settle (calculator, explicit URLs).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl LanguageModel for UnconfiguredModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Unconfigured)
    }

    fn configured(&self) -> bool {
        false
    }
}

/// Deterministic model that replays queued responses in order.
///
/// When the queue runs dry it echoes a stable digest of the prompt, so runs
/// stay deterministic even when a test under-scripts.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses to be returned by successive `complete` calls.
    #[must_use]
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        model
            .responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        model
    }

    /// Append one more scripted response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    /// Prompts seen so far, for assertions.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(response) = self.responses.lock().pop_front() {
            return Ok(response);
        }
        let head: String = prompt.chars().take(64).collect();
        Ok(format!("echo: {head}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_model_replays_in_order() {
        let model = ScriptedModel::with_responses(["one", "two"]);
        assert_eq!(model.complete("a").await.unwrap(), "one");
        assert_eq!(model.complete("b").await.unwrap(), "two");
        assert!(model.complete("c").await.unwrap().starts_with("echo: "));
        assert_eq!(model.prompts().len(), 3);
    }

    #[tokio::test]
    async fn unconfigured_model_fails_fast() {
        let model = UnconfiguredModel;
        assert!(!model.configured());
        assert!(matches!(
            model.complete("x").await,
            Err(LlmError::Unconfigured)
        ));
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(LlmError::Unavailable("503".into()).retryable());
        assert!(!LlmError::Unconfigured.retryable());
        assert!(!LlmError::Malformed("bad json".into()).retryable());
    }
}

//! Conversation summarization: standard and hierarchical.
//!
//! Summaries compress the prefix of a session's history while the trailing
//! `keep_recent_messages` stay raw; together they form the prompt context
//! for every node. Messages themselves are never truncated in storage — the
//! summary is a derived view.
//!
//! Two modes, chosen by history length:
//!
//! - **Standard** (`10 ≤ len < hierarchical_threshold`): one pass over the
//!   compressible prefix, folding in the prior summary.
//! - **Hierarchical** (`len ≥ hierarchical_threshold`): the prefix is split
//!   into `chunk_size` chunks, each summarized independently, then a meta
//!   pass folds the chunk summaries and the prior summary together.
//!
//! Output is capped at `summary_char_cap` characters.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::llm::{LanguageModel, LlmError};
use crate::message::Message;

/// Minimum history length before summarization is worth a model call.
pub const MIN_HISTORY: usize = 10;

/// Outcome of a summarization pass.
///
/// `chunk_summaries` records the intermediate chunk passes of hierarchical
/// mode (empty in standard mode), so tests can observe the production trace.
#[derive(Clone, Debug)]
pub struct SummaryReport {
    pub summary: String,
    pub chunk_summaries: Vec<String>,
    pub hierarchical: bool,
}

/// Summarizes conversation history through the injected language model.
pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
    settings: Arc<Settings>,
}

impl Summarizer {
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, settings: Arc<Settings>) -> Self {
        Self { llm, settings }
    }

    /// Summarize `history`, folding in `prior_summary`.
    ///
    /// Returns `None` when the history is too short to compress.
    #[instrument(skip_all, fields(history_len = history.len()))]
    pub async fn summarize(
        &self,
        history: &[Message],
        prior_summary: &str,
    ) -> Result<Option<SummaryReport>, LlmError> {
        if history.len() < MIN_HISTORY {
            return Ok(None);
        }
        let keep = self.settings.keep_recent_messages;
        let prefix = &history[..history.len().saturating_sub(keep)];
        if prefix.is_empty() {
            return Ok(None);
        }

        let report = if history.len() >= self.settings.hierarchical_threshold {
            self.hierarchical(prefix, prior_summary).await?
        } else {
            self.standard(prefix, prior_summary).await?
        };
        debug!(
            hierarchical = report.hierarchical,
            chunks = report.chunk_summaries.len(),
            chars = report.summary.len(),
            "summary produced"
        );
        Ok(Some(report))
    }

    async fn standard(
        &self,
        prefix: &[Message],
        prior_summary: &str,
    ) -> Result<SummaryReport, LlmError> {
        let transcript = render(prefix);
        let prompt = format!(
            "Distill the following conversation into a concise summary. \
             Include all key facts, decisions, and user preferences mentioned.\n\n\
             Existing summary: {prior_summary}\n\n\
             New messages to incorporate:\n{transcript}\n\nConcise summary:"
        );
        let summary = self.llm.complete(&prompt).await?;
        Ok(SummaryReport {
            summary: self.cap(summary),
            chunk_summaries: Vec::new(),
            hierarchical: false,
        })
    }

    async fn hierarchical(
        &self,
        prefix: &[Message],
        prior_summary: &str,
    ) -> Result<SummaryReport, LlmError> {
        let mut chunk_summaries = Vec::new();
        for chunk in prefix.chunks(self.settings.chunk_size) {
            let transcript = render(chunk);
            let prompt = format!(
                "Summarize this conversation segment concisely, preserving key facts:\n\n\
                 {transcript}\n\nBrief summary:"
            );
            match self.llm.complete(&prompt).await {
                Ok(summary) => chunk_summaries.push(summary),
                // One lost chunk degrades the summary, not the run.
                Err(err) => warn!(error = %err, "chunk summarization failed, skipping chunk"),
            }
        }
        if chunk_summaries.is_empty() {
            return Err(LlmError::Malformed(
                "all chunk summarizations failed".to_string(),
            ));
        }

        let bullet_list: String = chunk_summaries
            .iter()
            .map(|s| format!("- {s}\n"))
            .collect();
        let prompt = format!(
            "Create a comprehensive summary by combining these segment summaries. \
             Preserve all important facts, decisions, user preferences, and context.\n\n\
             Previous summary: {prior_summary}\n\n\
             New segment summaries:\n{bullet_list}\nComprehensive summary:"
        );
        let summary = self.llm.complete(&prompt).await?;
        Ok(SummaryReport {
            summary: self.cap(summary),
            chunk_summaries,
            hierarchical: true,
        })
    }

    fn cap(&self, summary: String) -> String {
        let cap = self.settings.summary_char_cap;
        if summary.chars().count() <= cap {
            summary
        } else {
            summary.chars().take(cap).collect()
        }
    }
}

fn render(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str(&msg.render());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    fn settings() -> Arc<Settings> {
        Arc::new(Settings::default())
    }

    fn history(pairs: usize) -> Vec<Message> {
        (0..pairs)
            .flat_map(|i| {
                [
                    Message::user(format!("question {i}")),
                    Message::assistant(format!("answer {i}")),
                ]
            })
            .collect()
    }

    #[tokio::test]
    async fn short_histories_are_not_summarized() {
        let summarizer = Summarizer::new(Arc::new(ScriptedModel::new()), settings());
        let report = summarizer.summarize(&history(4), "").await.unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn standard_mode_below_hierarchical_threshold() {
        let model = Arc::new(ScriptedModel::with_responses(["the gist"]));
        let summarizer = Summarizer::new(model.clone(), settings());
        let report = summarizer
            .summarize(&history(10), "older gist")
            .await
            .unwrap()
            .unwrap();
        assert!(!report.hierarchical);
        assert_eq!(report.summary, "the gist");
        assert!(report.chunk_summaries.is_empty());
        // The prior summary is folded into the prompt.
        assert!(model.prompts()[0].contains("older gist"));
        // Only the compressible prefix appears; the tail stays raw.
        assert!(!model.prompts()[0].contains("question 9"));
    }

    #[tokio::test]
    async fn hierarchical_mode_chunks_the_prefix() {
        // 60 pairs = 120 messages; prefix of 116 splits into 6 chunks of 20.
        let model = Arc::new(ScriptedModel::new());
        for i in 0..6 {
            model.push_response(format!("chunk {i}"));
        }
        model.push_response("meta summary");
        let summarizer = Summarizer::new(model, settings());
        let report = summarizer
            .summarize(&history(60), "")
            .await
            .unwrap()
            .unwrap();
        assert!(report.hierarchical);
        assert_eq!(report.chunk_summaries.len(), 6);
        assert_eq!(report.summary, "meta summary");
    }

    #[tokio::test]
    async fn summary_is_capped() {
        let mut settings = Settings::default();
        settings.summary_char_cap = 16;
        let model = Arc::new(ScriptedModel::with_responses([
            "a very long summary that exceeds the cap by a lot",
        ]));
        let summarizer = Summarizer::new(model, Arc::new(settings));
        let report = summarizer
            .summarize(&history(10), "")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.summary.chars().count(), 16);
    }
}

//! Translator: render the answer in the target language.
//!
//! Identity when the target language matches the deployment's base language,
//! which is the common case; the node still runs (and appears in the event
//! stream) so the trace shape is stable.

use async_trait::async_trait;
use tracing::warn;

use crate::llm::LlmError;
use crate::node::{AgentNode, NodeContext, NodeError};
use crate::state::{AgentState, StateDelta};

pub struct TranslatorNode;

#[async_trait]
impl AgentNode for TranslatorNode {
    async fn run(&self, state: &AgentState, ctx: &NodeContext) -> Result<StateDelta, NodeError> {
        let target = state
            .target_language
            .clone()
            .unwrap_or_else(|| ctx.settings.base_language.clone());
        if target.eq_ignore_ascii_case(&ctx.settings.base_language) {
            return Ok(StateDelta::default());
        }

        // For translation-intent queries there is no draft; the query itself
        // is the text to translate.
        let text = state
            .draft_answer
            .clone()
            .unwrap_or_else(|| state.query.clone());
        let prompt = format!(
            "Translate the following text into {target}. Provide only the \
             translated text and keep any markdown formatting.\n\n{text}"
        );
        match ctx.llm.complete(&prompt).await {
            Ok(translated) => Ok(StateDelta {
                final_answer: Some(translated.trim().to_string()),
                target_language: Some(target),
                ..Default::default()
            }),
            Err(err) if err.retryable() => Err(err.into()),
            Err(LlmError::Unconfigured | LlmError::Malformed(_) | LlmError::Unavailable(_)) => {
                // Better an untranslated answer than no answer.
                warn!(target, "translation unavailable, keeping base language");
                Ok(StateDelta::default())
            }
        }
    }
}

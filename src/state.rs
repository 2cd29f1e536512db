//! Pipeline state: one record, updated by partial deltas.
//!
//! [`AgentState`] is the single tagged record that flows through the graph.
//! Nodes never mutate it directly; they return a [`StateDelta`] — a partial
//! mirror where every field is optional — and the runtime merges the delta
//! into the state. Because the delta serializes with absent fields skipped,
//! the serialized delta *is* the diff that subscribers see in
//! `{"node": ..., "state": ...}` stream events.
//!
//! # Examples
//!
//! ```rust
//! use askgraph::state::{AgentState, StateDelta};
//!
//! let mut state = AgentState::new("What is 2 + 2?");
//! let delta = StateDelta {
//!     draft_answer: Some("4".to_string()),
//!     ..Default::default()
//! };
//! state.apply(delta);
//! assert_eq!(state.draft_answer.as_deref(), Some("4"));
//! ```

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::{ToolKind, Verdict};

/// A normalized unit of retrieved content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub text: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Evidence {
    #[must_use]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            score: None,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// The router's choice of tool, with its reasoning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tool: ToolKind,
    pub reasoning: String,
    /// Only set for [`ToolKind::TargetedCrawl`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

impl RoutingDecision {
    #[must_use]
    pub fn new(tool: ToolKind, reasoning: impl Into<String>) -> Self {
        Self {
            tool,
            reasoning: reasoning.into(),
            target_url: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }
}

/// The critic's structured review of a draft answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
    /// Concrete fixes the generator must apply on revision.
    pub instructions: String,
}

/// A stage failure recorded in state before the run transitions to the
/// error terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: String,
    pub message: String,
    pub retryable: bool,
}

/// The full pipeline state for one run.
///
/// Also the persisted checkpoint body: the worker seeds `chat_history` and
/// `summary` from the previous checkpoint, and what it saves at end of run
/// becomes the canonical view of the session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Current user input.
    pub query: String,
    /// Prior turns (full raw history; the summary is a derived view).
    #[serde(default)]
    pub chat_history: Vec<Message>,
    /// Rolling summary of the compressed prefix of `chat_history`.
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_context: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_answer: Option<String>,
    /// Indices into `retrieved_context` backing the draft.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<Critique>,
    #[serde(default)]
    pub revision_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl AgentState {
    /// Fresh state for a new query with no prior session context.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// State seeded from a prior session checkpoint.
    #[must_use]
    pub fn for_turn(
        query: impl Into<String>,
        chat_history: Vec<Message>,
        summary: String,
        target_language: Option<String>,
    ) -> Self {
        Self {
            query: query.into(),
            chat_history,
            summary,
            target_language,
            ..Default::default()
        }
    }

    /// Merge a partial update into this state.
    ///
    /// Fields present in the delta overwrite; absent fields are untouched.
    /// List fields are replaced wholesale — nodes that extend a list read it
    /// from the snapshot and return the grown list.
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(v) = delta.summary {
            self.summary = v;
        }
        if let Some(v) = delta.routing_decision {
            self.routing_decision = Some(v);
        }
        if let Some(v) = delta.intent {
            self.intent = Some(v);
        }
        if let Some(v) = delta.plan {
            self.plan = v;
        }
        if let Some(v) = delta.retrieved_context {
            self.retrieved_context = v;
        }
        if let Some(v) = delta.draft_answer {
            self.draft_answer = Some(v);
        }
        if let Some(v) = delta.citations {
            self.citations = v;
        }
        if let Some(v) = delta.critique {
            self.critique = Some(v);
        }
        if let Some(v) = delta.revision_count {
            self.revision_count = v;
        }
        if let Some(v) = delta.final_answer {
            self.final_answer = Some(v);
        }
        if let Some(v) = delta.target_language {
            self.target_language = Some(v);
        }
        if let Some(v) = delta.error {
            self.error = Some(v);
        }
    }

    /// The routed tool, when the router has run.
    #[must_use]
    pub fn routed_tool(&self) -> Option<ToolKind> {
        self.routing_decision.as_ref().map(|d| d.tool)
    }

    /// The prompt context handed to nodes: the rolling summary plus the
    /// trailing uncompressed messages. The full raw history never enters a
    /// prompt directly.
    #[must_use]
    pub fn prompt_context(&self, keep_recent: usize) -> String {
        let mut out = String::new();
        if !self.summary.is_empty() {
            out.push_str("Conversation summary: ");
            out.push_str(&self.summary);
            out.push('\n');
        }
        let tail_start = self.chat_history.len().saturating_sub(keep_recent);
        for msg in &self.chat_history[tail_start..] {
            out.push_str(&msg.render());
            out.push('\n');
        }
        out
    }
}

/// A partial update to [`AgentState`], produced by one node.
///
/// Serializes to exactly the changed fields, which is what subscribers see
/// as the per-node state diff.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<Vec<Evidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<Critique>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

impl StateDelta {
    /// True when the node changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == StateDelta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut state = AgentState::new("q");
        state.intent = Some("lookup".to_string());
        state.apply(StateDelta {
            draft_answer: Some("draft".to_string()),
            ..Default::default()
        });
        assert_eq!(state.intent.as_deref(), Some("lookup"));
        assert_eq!(state.draft_answer.as_deref(), Some("draft"));
    }

    #[test]
    fn delta_serializes_to_the_diff_only() {
        let delta = StateDelta {
            intent: Some("compare".to_string()),
            revision_count: Some(1),
            ..Default::default()
        };
        let value = serde_json::to_value(&delta).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["intent"], "compare");
        assert_eq!(obj["revision_count"], 1);
    }

    #[test]
    fn empty_delta_serializes_to_empty_object() {
        let value = serde_json::to_value(StateDelta::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
        assert!(StateDelta::default().is_empty());
    }

    #[test]
    fn prompt_context_is_summary_plus_tail() {
        let history: Vec<Message> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect();
        let state = AgentState::for_turn("now", history, "earlier facts".to_string(), None);
        let ctx = state.prompt_context(4);
        assert!(ctx.starts_with("Conversation summary: earlier facts"));
        assert!(ctx.contains("user: q4"));
        assert!(!ctx.contains("q2"));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = AgentState::new("q");
        state.routing_decision = Some(RoutingDecision::new(ToolKind::WebSearch, "open question"));
        state.retrieved_context = vec![Evidence::new("fact", "https://example.com").with_score(0.9)];
        state.revision_count = 2;
        let json = serde_json::to_string(&state).unwrap();
        let back: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}

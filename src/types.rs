//! Core domain types for the askgraph pipeline.
//!
//! This module defines the closed sets the orchestrator is built on:
//! which tool a query is routed to ([`ToolKind`]), what the critic decided
//! ([`Verdict`]), and which stage of the pipeline is executing ([`Stage`]).
//!
//! All three are deliberately closed enums: adding a tool or a stage is a
//! code change, which keeps routing exhaustive and per-stage budgets
//! enforceable.
//!
//! # Examples
//!
//! ```rust
//! use askgraph::types::{Stage, ToolKind};
//!
//! let tool = ToolKind::Calculator;
//! assert_eq!(tool.as_str(), "calculator");
//! assert_eq!(ToolKind::parse("calculator"), Some(ToolKind::Calculator));
//!
//! assert_eq!(Stage::Router.as_str(), "router");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tool a query is routed to.
///
/// Produced by the router node and consumed by the retrieval and generator
/// nodes. Persisted in checkpoints and feedback records in its string form,
/// so the `serde` renames below are part of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Open web search for current events and unscoped questions.
    WebSearch,
    /// Fetch and read one explicitly named URL.
    TargetedCrawl,
    /// Query the internal document index.
    InternalRetrieval,
    /// Evaluate an arithmetic expression locally.
    Calculator,
    /// The query itself is a translation request.
    Translate,
    /// Answer from model knowledge without any tool.
    DirectAnswer,
}

impl ToolKind {
    /// Stable string form used on the wire and in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::TargetedCrawl => "targeted_crawl",
            ToolKind::InternalRetrieval => "internal_retrieval",
            ToolKind::Calculator => "calculator",
            ToolKind::Translate => "translate",
            ToolKind::DirectAnswer => "direct_answer",
        }
    }

    /// Parse the stable string form back into a `ToolKind`.
    ///
    /// Returns `None` for anything outside the closed set, which callers
    /// treat as "route to [`ToolKind::DirectAnswer`]".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "web_search" => Some(ToolKind::WebSearch),
            "targeted_crawl" => Some(ToolKind::TargetedCrawl),
            "internal_retrieval" => Some(ToolKind::InternalRetrieval),
            "calculator" => Some(ToolKind::Calculator),
            "translate" => Some(ToolKind::Translate),
            "direct_answer" => Some(ToolKind::DirectAnswer),
            _ => None,
        }
    }

    /// True when the tool needs no planning or retrieval pass.
    #[must_use]
    pub fn is_shortcut(&self) -> bool {
        matches!(
            self,
            ToolKind::Calculator | ToolKind::DirectAnswer | ToolKind::Translate
        )
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the critic's review of a draft answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The draft is good enough to ship.
    Approved,
    /// The draft needs another generator pass; instructions say what to fix.
    NeedsRevision,
    /// Safety or policy violation. Terminates the revision loop with a
    /// sanitized message instead of the draft.
    Rejected,
}

impl Verdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "approved" => Some(Verdict::Approved),
            "needs_revision" => Some(Verdict::NeedsRevision),
            "rejected" => Some(Verdict::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Approved => "approved",
            Verdict::NeedsRevision => "needs_revision",
            Verdict::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// One stage of the fixed pipeline graph.
///
/// The executor starts at [`Stage::Router`] and applies the transition table
/// in [`crate::graph`] until [`Stage::Finalize`] completes. Stage names are
/// what subscribers see in `{"node": ...}` stream events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Router,
    Planner,
    Retrieval,
    Generator,
    Critic,
    Translator,
    Summarize,
    Finalize,
}

impl Stage {
    /// Stable name used in stream events and error payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Router => "router",
            Stage::Planner => "planner",
            Stage::Retrieval => "retrieval",
            Stage::Generator => "generator",
            Stage::Critic => "critic",
            Stage::Translator => "translator",
            Stage::Summarize => "summarize",
            Stage::Finalize => "finalize",
        }
    }

    /// Every stage, in canonical order. Used to register nodes exhaustively.
    pub const ALL: [Stage; 8] = [
        Stage::Router,
        Stage::Planner,
        Stage::Retrieval,
        Stage::Generator,
        Stage::Critic,
        Stage::Translator,
        Stage::Summarize,
        Stage::Finalize,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_kind_round_trips_through_strings() {
        for tool in [
            ToolKind::WebSearch,
            ToolKind::TargetedCrawl,
            ToolKind::InternalRetrieval,
            ToolKind::Calculator,
            ToolKind::Translate,
            ToolKind::DirectAnswer,
        ] {
            assert_eq!(ToolKind::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolKind::parse("teleport"), None);
    }

    #[test]
    fn tool_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&ToolKind::WebSearch).unwrap();
        assert_eq!(json, "\"web_search\"");
        let back: ToolKind = serde_json::from_str("\"targeted_crawl\"").unwrap();
        assert_eq!(back, ToolKind::TargetedCrawl);
    }

    #[test]
    fn shortcut_tools_skip_planning() {
        assert!(ToolKind::Calculator.is_shortcut());
        assert!(ToolKind::DirectAnswer.is_shortcut());
        assert!(ToolKind::Translate.is_shortcut());
        assert!(!ToolKind::WebSearch.is_shortcut());
        assert!(!ToolKind::InternalRetrieval.is_shortcut());
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Router.to_string(), "router");
        assert_eq!(Stage::Finalize.to_string(), "finalize");
        assert_eq!(Stage::ALL.len(), 8);
    }
}

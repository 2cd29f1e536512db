//! The transition table.
//!
//! ```text
//! router ─► planner ─► retrieval ─► generator ─► critic ─► translator ─► summarize ─► finalize
//!    │                                  ▲   │        │           ▲
//!    │ calculator / direct_answer /     │   │        │ needs_revision (bounded)
//!    │ translate                        │   └────────┘
//!    └──────────────────────────────────┘
//! ```
//!
//! Shortcut tools skip planning and retrieval entirely and skip the critic
//! (there is nothing to fact-check in a local calculation or a translation).
//! The revision loop is bounded by `max_revisions`; the increment happens
//! when the edge is taken, so the count can never exceed the cap.

use crate::config::Settings;
use crate::state::AgentState;
use crate::types::{Stage, Verdict};

/// Where the executor goes after a stage completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Proceed to the named stage.
    Next(Stage),
    /// Take the revision edge: increment `revision_count`, re-enter the
    /// generator.
    Revise,
    /// The run is complete.
    Done,
}

/// Evaluate the conditional edge out of `stage` against the current state.
#[must_use]
pub fn next_stage(stage: Stage, state: &AgentState, settings: &Settings) -> Transition {
    let shortcut = state.routed_tool().map(|t| t.is_shortcut()).unwrap_or(false);
    match stage {
        Stage::Router => {
            if shortcut {
                Transition::Next(Stage::Generator)
            } else {
                Transition::Next(Stage::Planner)
            }
        }
        Stage::Planner => Transition::Next(Stage::Retrieval),
        Stage::Retrieval => Transition::Next(Stage::Generator),
        Stage::Generator => {
            if shortcut {
                Transition::Next(Stage::Translator)
            } else {
                Transition::Next(Stage::Critic)
            }
        }
        Stage::Critic => {
            let wants_revision = state
                .critique
                .as_ref()
                .map(|c| c.verdict == Verdict::NeedsRevision)
                .unwrap_or(false);
            if wants_revision && state.revision_count < settings.max_revisions {
                Transition::Revise
            } else {
                Transition::Next(Stage::Translator)
            }
        }
        Stage::Translator => Transition::Next(Stage::Summarize),
        Stage::Summarize => Transition::Next(Stage::Finalize),
        Stage::Finalize => Transition::Done,
    }
}

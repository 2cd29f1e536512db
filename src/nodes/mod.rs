//! The agent nodes: one module per pipeline stage.
//!
//! Each node is a pure mapping from [`AgentState`](crate::state::AgentState)
//! to a [`StateDelta`](crate::state::StateDelta) (the retrieval node is the
//! one exception — it calls the tool adapters). Nodes that consult the
//! language model ask for structured JSON and degrade deterministically when
//! the response cannot be parsed, so a misbehaving model never wedges a run.

pub mod critic;
pub mod finalize;
pub mod generator;
pub mod planner;
pub mod retrieval;
pub mod router;
pub mod summarize;
pub mod translator;

pub use critic::CriticNode;
pub use finalize::FinalizeNode;
pub use generator::GeneratorNode;
pub use planner::PlannerNode;
pub use retrieval::RetrievalNode;
pub use router::RouterNode;
pub use summarize::SummarizeNode;
pub use translator::TranslatorNode;

use serde::de::DeserializeOwned;

/// Pull the first JSON object out of a model response.
///
/// Models wrap JSON in prose or code fences often enough that strict
/// parsing of the whole response is a losing game; this finds the outermost
/// `{...}` span and parses that.
pub(crate) fn parse_json_block<T: DeserializeOwned>(response: &str) -> Option<T> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        tool: String,
    }

    #[test]
    fn parses_fenced_json() {
        let response = "Sure, here is the decision:\n```json\n{\"tool\": \"web_search\"}\n```";
        let probe: Probe = parse_json_block(response).unwrap();
        assert_eq!(probe.tool, "web_search");
    }

    #[test]
    fn rejects_prose_without_json() {
        assert!(parse_json_block::<Probe>("no json here").is_none());
        assert!(parse_json_block::<Probe>("} backwards {").is_none());
    }
}

//! Stream events: the objects subscribers receive over SSE.
//!
//! Each request produces one ordered event stream. The wire shapes are fixed:
//!
//! ```text
//! {"event":"connected","request_id":"..."}
//! {"node":"router","state":{...changed fields...}}
//! {"event":"error","error":"...","stage":"router"}
//! {"event":"complete","state":{"final_answer":...,"routing_decision":...,"intent":...,"summary":...}}
//! ```
//!
//! Exactly one terminal event (`complete` or `error`) is published per
//! request, and nothing follows it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AgentState;
use crate::types::Stage;

/// One event on a request's stream.
///
/// The enum is untagged so each variant serializes to its exact wire shape;
/// the `event` marker fields are fixed strings set by the constructors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    /// A node finished; `state` carries only the fields it changed.
    Node { node: String, state: Value },
    /// Terminal failure, with the stage that failed.
    Error {
        event: String,
        error: String,
        stage: String,
    },
    /// Terminal success, with the answer and selected state fields.
    Complete { event: String, state: Value },
    /// First event on every stream.
    Connected { event: String, request_id: String },
}

impl StreamEvent {
    #[must_use]
    pub fn connected(request_id: impl Into<String>) -> Self {
        StreamEvent::Connected {
            event: "connected".to_string(),
            request_id: request_id.into(),
        }
    }

    /// Node-completion event carrying the serialized state diff.
    #[must_use]
    pub fn node(stage: Stage, delta: Value) -> Self {
        StreamEvent::Node {
            node: stage.as_str().to_string(),
            state: delta,
        }
    }

    #[must_use]
    pub fn error(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            event: "error".to_string(),
            error: message.into(),
            stage: stage.into(),
        }
    }

    /// Terminal `complete` event built from the final run state.
    #[must_use]
    pub fn complete(state: &AgentState) -> Self {
        StreamEvent::Complete {
            event: "complete".to_string(),
            state: serde_json::json!({
                "final_answer": state.final_answer,
                "routing_decision": state.routed_tool().map(|t| t.as_str()),
                "intent": state.intent,
                "summary": state.summary,
            }),
        }
    }

    /// `complete` and `error` close the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Complete { .. } | StreamEvent::Error { .. }
        )
    }

    /// Short label for logs and assertions.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Node { .. } => "node",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Complete { .. } => "complete",
        }
    }

    /// Node name, for `node` events.
    #[must_use]
    pub fn node_name(&self) -> Option<&str> {
        match self {
            StreamEvent::Node { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// Destination for events emitted during a run.
///
/// The worker wires this to the broker's per-request channel; tests wire it
/// to a collecting buffer. Emission is best-effort from the runtime's point
/// of view — a lost subscriber never fails a run.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

/// Emitter that appends into a shared vector. Test instrumentation.
#[derive(Clone, Default)]
pub struct CollectingEmitter {
    events: std::sync::Arc<parking_lot::Mutex<Vec<StreamEvent>>>,
}

impl CollectingEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }
}

impl EventEmitter for CollectingEmitter {
    fn emit(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_matches_wire_shape() {
        let json = serde_json::to_value(StreamEvent::connected("req-1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "connected", "request_id": "req-1"})
        );
    }

    #[test]
    fn node_event_carries_delta() {
        let event = StreamEvent::node(Stage::Router, serde_json::json!({"intent": "lookup"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["node"], "router");
        assert_eq!(json["state"]["intent"], "lookup");
    }

    #[test]
    fn terminal_detection() {
        assert!(StreamEvent::error("router", "boom").is_terminal());
        assert!(StreamEvent::complete(&AgentState::new("q")).is_terminal());
        assert!(!StreamEvent::connected("r").is_terminal());
    }

    #[test]
    fn untagged_deserialization_picks_the_right_variant() {
        let error: StreamEvent =
            serde_json::from_str(r#"{"event":"error","error":"boom","stage":"critic"}"#).unwrap();
        assert_eq!(error.kind(), "error");

        let node: StreamEvent = serde_json::from_str(r#"{"node":"planner","state":{}}"#).unwrap();
        assert_eq!(node.node_name(), Some("planner"));

        let connected: StreamEvent =
            serde_json::from_str(r#"{"event":"connected","request_id":"r"}"#).unwrap();
        assert_eq!(connected.kind(), "connected");
    }
}

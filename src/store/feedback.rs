//! Feedback records and their analytics rollup.
//!
//! Feedback is append-only: a record is written once when a user rates an
//! assistant message and never updated. Analytics aggregate counts and a
//! satisfaction rate overall and per routing decision, optionally filtered
//! by start date and tool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Up,
    Down,
}

impl FeedbackKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Up => "up",
            FeedbackKind::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(FeedbackKind::Up),
            "down" => Some(FeedbackKind::Down),
            _ => None,
        }
    }
}

/// One immutable feedback record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub session_id: String,
    /// Position of the rated message in the client's view of the chat.
    pub message_index: i64,
    pub feedback_type: FeedbackKind,
    pub user_query: String,
    pub assistant_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Filters for the analytics rollup.
#[derive(Clone, Debug, Default)]
pub struct FeedbackFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub routing_decision: Option<String>,
}

impl FeedbackFilter {
    #[must_use]
    pub fn matches(&self, feedback: &Feedback) -> bool {
        if let Some(start) = self.start_date {
            if feedback.created_at < start {
                return false;
            }
        }
        if let Some(tool) = &self.routing_decision {
            if feedback.routing_decision.as_deref() != Some(tool.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Per-tool slice of the rollup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolFeedback {
    pub routing_decision: String,
    pub total: u64,
    pub thumbs_up: u64,
    pub thumbs_down: u64,
    pub satisfaction_rate: f64,
}

/// The analytics response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAnalytics {
    pub total: u64,
    pub thumbs_up: u64,
    pub thumbs_down: u64,
    pub satisfaction_rate: f64,
    pub by_routing_decision: Vec<ToolFeedback>,
}

/// Percentage of thumbs-up, rounded to two decimals.
#[must_use]
pub fn satisfaction_rate(thumbs_up: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = thumbs_up as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Append-only feedback persistence.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persist one record, returning its id.
    async fn append(&self, feedback: Feedback) -> Result<String, StoreError>;

    /// Aggregate counts and satisfaction, overall and per tool.
    async fn analytics(&self, filter: FeedbackFilter) -> Result<FeedbackAnalytics, StoreError>;
}

/// Fold a set of records into the analytics shape. Shared by backends that
/// aggregate in process.
#[must_use]
pub fn aggregate<'a>(records: impl Iterator<Item = &'a Feedback>) -> FeedbackAnalytics {
    let mut total = 0;
    let mut thumbs_up = 0;
    let mut by_tool: std::collections::BTreeMap<String, (u64, u64)> =
        std::collections::BTreeMap::new();
    for record in records {
        total += 1;
        let up = record.feedback_type == FeedbackKind::Up;
        if up {
            thumbs_up += 1;
        }
        let tool = record
            .routing_decision
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let entry = by_tool.entry(tool).or_insert((0, 0));
        entry.0 += 1;
        if up {
            entry.1 += 1;
        }
    }
    let by_routing_decision = by_tool
        .into_iter()
        .map(|(tool, (tool_total, tool_up))| ToolFeedback {
            routing_decision: tool,
            total: tool_total,
            thumbs_up: tool_up,
            thumbs_down: tool_total - tool_up,
            satisfaction_rate: satisfaction_rate(tool_up, tool_total),
        })
        .collect();
    FeedbackAnalytics {
        total,
        thumbs_up,
        thumbs_down: total - thumbs_up,
        satisfaction_rate: satisfaction_rate(thumbs_up, total),
        by_routing_decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: FeedbackKind, tool: &str) -> Feedback {
        Feedback {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s1".to_string(),
            message_index: 1,
            feedback_type: kind,
            user_query: "q".to_string(),
            assistant_response: "a".to_string(),
            routing_decision: Some(tool.to_string()),
            intent: None,
            model_used: None,
            response_time_ms: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn aggregate_rolls_up_by_tool() {
        let records = vec![
            record(FeedbackKind::Up, "web_search"),
            record(FeedbackKind::Up, "web_search"),
            record(FeedbackKind::Down, "web_search"),
            record(FeedbackKind::Up, "calculator"),
        ];
        let analytics = aggregate(records.iter());
        assert_eq!(analytics.total, 4);
        assert_eq!(analytics.thumbs_up, 3);
        assert_eq!(analytics.satisfaction_rate, 75.0);
        let web = analytics
            .by_routing_decision
            .iter()
            .find(|t| t.routing_decision == "web_search")
            .unwrap();
        assert_eq!(web.total, 3);
        assert_eq!(web.satisfaction_rate, 66.67);
    }

    #[test]
    fn empty_aggregate_is_zeroed() {
        let analytics = aggregate(std::iter::empty());
        assert_eq!(analytics.total, 0);
        assert_eq!(analytics.satisfaction_rate, 0.0);
        assert!(analytics.by_routing_decision.is_empty());
    }

    #[test]
    fn filter_applies_date_and_tool() {
        let mut old = record(FeedbackKind::Up, "web_search");
        old.created_at = Utc::now() - chrono::Duration::days(10);
        let fresh = record(FeedbackKind::Up, "calculator");
        let filter = FeedbackFilter {
            start_date: Some(Utc::now() - chrono::Duration::days(1)),
            routing_decision: Some("calculator".to_string()),
        };
        assert!(!filter.matches(&old));
        assert!(filter.matches(&fresh));
    }
}

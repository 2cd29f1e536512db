//! Broker semantics: FIFO claims, replay within the grace window, and the
//! exactly-one-terminal rule.

use std::time::Duration;

use askgraph::broker::{Broker, BrokerError, Job};
use askgraph::events::StreamEvent;
use askgraph::state::AgentState;
use askgraph::types::Stage;

#[tokio::test]
async fn enqueue_opens_the_stream_channel_immediately() {
    let broker = Broker::new(64, Duration::from_secs(300));
    let job = Job::new("s1", "a question");
    let request_id = job.request_id.clone();
    broker.enqueue(job).unwrap();

    // Subscribing before any worker has claimed the job must succeed.
    let subscription = broker.subscribe(&request_id).unwrap();
    assert!(subscription.replayed().is_empty());

    let claimed = broker.claim(Duration::from_millis(50)).await.unwrap();
    assert_eq!(claimed.request_id, request_id);
}

#[tokio::test]
async fn subscriber_within_grace_sees_the_terminal_event() {
    let broker = Broker::new(64, Duration::from_secs(300));
    broker.publish("r1", StreamEvent::connected("r1")).unwrap();
    broker
        .publish("r1", StreamEvent::node(Stage::Router, serde_json::json!({})))
        .unwrap();
    broker
        .publish("r1", StreamEvent::complete(&AgentState::new("q")))
        .unwrap();

    let events = broker
        .subscribe("r1")
        .unwrap()
        .collect_until_terminal(Duration::from_millis(50))
        .await;
    assert_eq!(events.last().unwrap().kind(), "complete");
}

#[tokio::test]
async fn subscriber_after_grace_gets_unknown_request() {
    let broker = Broker::new(64, Duration::from_millis(10));
    broker
        .publish("r1", StreamEvent::complete(&AgentState::new("q")))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = broker.subscribe("r1").unwrap_err();
    assert!(matches!(err, BrokerError::UnknownRequest { .. }));
    assert!(err.to_string().contains("unknown request_id"));
}

#[tokio::test]
async fn terminal_event_is_exactly_once() {
    let broker = Broker::new(64, Duration::from_secs(300));
    broker
        .publish("r1", StreamEvent::complete(&AgentState::new("q")))
        .unwrap();
    let err = broker
        .publish("r1", StreamEvent::error("late", "should not land"))
        .unwrap_err();
    assert!(matches!(err, BrokerError::Terminated { .. }));
}

#[tokio::test]
async fn contended_jobs_are_claimed_exactly_once() {
    let broker = Broker::new(64, Duration::from_secs(300));
    let total = 40;
    for i in 0..total {
        broker.enqueue(Job::new("s", format!("q{i}"))).unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let broker = broker.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = broker.claim(Duration::from_millis(20)).await {
                claimed.push(job.request_id);
            }
            claimed
        }));
    }
    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: std::collections::HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), total);
    assert_eq!(unique.len(), total);
}

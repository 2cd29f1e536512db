//! The broker: a FIFO job queue plus per-request event fan-out.
//!
//! One shared [`Broker`] connects the HTTP layer to the workers. The queue
//! side is competing-consumer — each job is claimed by exactly one worker.
//! The pub/sub side gives every request its own ordered event channel with
//! a bounded replay buffer, so subscribers that arrive late (or reconnect)
//! still see what happened.

pub mod pubsub;
pub mod queue;

pub use pubsub::{RequestHub, Subscription};
pub use queue::JobQueue;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;
use crate::events::StreamEvent;

/// One unit of queued work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub request_id: String,
    pub session_id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    /// New job with a fresh globally-unique request id.
    #[must_use]
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            query: query.into(),
            target_language: None,
            model: None,
            enqueued_at: Utc::now(),
        }
    }
}

/// Errors surfaced by broker operations.
#[derive(Debug, Error, Diagnostic)]
pub enum BrokerError {
    /// The queue is gone (shutdown). `enqueue` fails fast on this.
    #[error("broker unavailable: {0}")]
    #[diagnostic(code(askgraph::broker::unavailable))]
    Unavailable(String),

    /// No channel exists for this request id — it never existed, or its
    /// replay window expired.
    #[error("unknown request_id: {request_id}")]
    #[diagnostic(
        code(askgraph::broker::unknown_request),
        help("Terminal events are replayable only within the grace window.")
    )]
    UnknownRequest { request_id: String },

    /// A publish arrived after the terminal event. Exactly one terminal is
    /// allowed per request, and nothing may follow it.
    #[error("request {request_id} already terminated")]
    #[diagnostic(code(askgraph::broker::terminated))]
    Terminated { request_id: String },
}

/// Queue and hub behind one shared handle.
#[derive(Clone)]
pub struct Broker {
    queue: JobQueue,
    hub: Arc<RequestHub>,
}

impl Broker {
    #[must_use]
    pub fn new(replay_buffer: usize, sub_grace: Duration) -> Self {
        Self {
            queue: JobQueue::new(),
            hub: Arc::new(RequestHub::new(replay_buffer, sub_grace)),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.replay_buffer, settings.sub_grace)
    }

    /// Enqueue a job and open its event channel, so a subscriber can attach
    /// before any worker picks the job up.
    pub fn enqueue(&self, job: Job) -> Result<(), BrokerError> {
        self.hub.register(&job.request_id);
        self.queue.enqueue(job)
    }

    /// Claim one job, blocking up to `timeout`. Each job goes to exactly one
    /// caller.
    pub async fn claim(&self, timeout: Duration) -> Option<Job> {
        self.queue.claim(timeout).await
    }

    /// Publish an event onto a request's channel.
    pub fn publish(&self, request_id: &str, event: StreamEvent) -> Result<(), BrokerError> {
        self.hub.publish(request_id, event)
    }

    /// Subscribe to a request's channel: buffered replay plus live events.
    pub fn subscribe(&self, request_id: &str) -> Result<Subscription, BrokerError> {
        self.hub.subscribe(request_id)
    }

    /// Jobs waiting to be claimed.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue can accept work. Reported by `/health`.
    #[must_use]
    pub fn available(&self) -> bool {
        self.queue.connected()
    }
}

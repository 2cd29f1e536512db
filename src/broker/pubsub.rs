//! Per-request pub/sub with a bounded replay buffer.
//!
//! Every request id owns one channel. Publishing appends to a replay ring
//! (the last `replay_buffer` events) and fans out to live subscribers over
//! a broadcast channel; both happen under one lock, so a subscriber's
//! replay snapshot and its live receiver line up with no gap and no
//! duplicates.
//!
//! After the terminal event the live side closes, but the channel lingers
//! for the grace window so late subscribers still observe `complete` or
//! `error`. Past the window the request id is unknown again.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tracing::warn;

use super::BrokerError;
use crate::events::StreamEvent;

/// Live-side buffer per subscriber; slow subscribers lag rather than block
/// publishers.
const BROADCAST_CAPACITY: usize = 1024;

struct ChannelState {
    sender: Option<broadcast::Sender<StreamEvent>>,
    replay: VecDeque<StreamEvent>,
    terminal_at: Option<Instant>,
}

impl ChannelState {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            sender: Some(sender),
            replay: VecDeque::new(),
            terminal_at: None,
        }
    }

    fn expired(&self, grace: Duration) -> bool {
        self.terminal_at
            .map(|at| at.elapsed() > grace)
            .unwrap_or(false)
    }
}

/// The fan-out hub shared by workers and SSE handlers.
pub struct RequestHub {
    channels: RwLock<FxHashMap<String, ChannelState>>,
    replay_cap: usize,
    grace: Duration,
}

impl RequestHub {
    #[must_use]
    pub fn new(replay_cap: usize, grace: Duration) -> Self {
        Self {
            channels: RwLock::new(FxHashMap::default()),
            replay_cap: replay_cap.max(1),
            grace,
        }
    }

    /// Open a channel for a request id. Idempotent.
    pub fn register(&self, request_id: &str) {
        let mut channels = self.channels.write();
        Self::purge(&mut channels, self.grace);
        channels
            .entry(request_id.to_string())
            .or_insert_with(ChannelState::new);
    }

    /// Publish one event in order. The terminal event closes the live side
    /// and starts the replay grace window; publishing past it is an error.
    pub fn publish(&self, request_id: &str, event: StreamEvent) -> Result<(), BrokerError> {
        let mut channels = self.channels.write();
        Self::purge(&mut channels, self.grace);
        let channel = channels
            .entry(request_id.to_string())
            .or_insert_with(ChannelState::new);
        if channel.terminal_at.is_some() {
            return Err(BrokerError::Terminated {
                request_id: request_id.to_string(),
            });
        }

        channel.replay.push_back(event.clone());
        while channel.replay.len() > self.replay_cap {
            channel.replay.pop_front();
        }
        if let Some(sender) = &channel.sender {
            // No live subscribers is fine; replay covers them.
            let _ = sender.send(event.clone());
        }
        if event.is_terminal() {
            channel.terminal_at = Some(Instant::now());
            channel.sender = None;
        }
        Ok(())
    }

    /// Snapshot the replay buffer and attach to the live feed, atomically.
    pub fn subscribe(&self, request_id: &str) -> Result<Subscription, BrokerError> {
        let mut channels = self.channels.write();
        Self::purge(&mut channels, self.grace);
        let channel = channels
            .get(request_id)
            .ok_or_else(|| BrokerError::UnknownRequest {
                request_id: request_id.to_string(),
            })?;
        Ok(Subscription {
            replay: channel.replay.iter().cloned().collect(),
            live: channel.sender.as_ref().map(|s| s.subscribe()),
        })
    }

    fn purge(channels: &mut FxHashMap<String, ChannelState>, grace: Duration) {
        channels.retain(|_, channel| !channel.expired(grace));
    }

    /// Channels currently held (live or within grace).
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

/// One subscriber's view: buffered history plus the live feed.
pub struct Subscription {
    replay: Vec<StreamEvent>,
    live: Option<broadcast::Receiver<StreamEvent>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("replay", &self.replay)
            .field("live", &self.live.is_some())
            .finish()
    }
}

impl Subscription {
    /// Events already buffered at subscription time.
    #[must_use]
    pub fn replayed(&self) -> &[StreamEvent] {
        &self.replay
    }

    /// Flatten into one ordered stream that ends after the terminal event.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        let replayed = stream::iter(self.replay);
        let live: BoxStream<'static, StreamEvent> = match self.live {
            Some(receiver) => stream::unfold(receiver, |mut receiver| async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => return Some((event, receiver)),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "event stream lagged; subscriber dropped events");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            })
            .boxed(),
            None => stream::empty().boxed(),
        };
        let mut finished = false;
        replayed
            .chain(live)
            .take_while(move |event| {
                let keep = !finished;
                if event.is_terminal() {
                    finished = true;
                }
                futures_util::future::ready(keep)
            })
            .boxed()
    }

    /// Pull events until the terminal one, with a per-event timeout.
    /// Test convenience.
    pub async fn collect_until_terminal(self, per_event: Duration) -> Vec<StreamEvent> {
        let mut stream = self.into_stream();
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(per_event, stream.next()).await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

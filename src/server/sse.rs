//! The SSE endpoint.
//!
//! On connect the subscriber gets the buffered replay, then live events,
//! until the terminal event closes the stream. A keep-alive comment goes out
//! every 15 seconds while idle. An unknown (or expired) request id yields a
//! single `error` event; client disconnects never affect the worker.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::events::StreamEvent;

use super::AppContext;

/// Seconds between keep-alive comments on an idle stream.
const HEARTBEAT: Duration = Duration::from_secs(15);

/// `GET /api/stream/:request_id`
pub async fn stream(
    State(ctx): State<AppContext>,
    Path(request_id): Path<String>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let events: BoxStream<'static, StreamEvent> = match ctx.broker.subscribe(&request_id) {
        Ok(subscription) => subscription.into_stream(),
        Err(err) => {
            debug!(%request_id, error = %err, "stream subscription rejected");
            stream::iter(vec![StreamEvent::error("stream", err.to_string())]).boxed()
        }
    };

    let sse_events = events.map(|event| {
        let frame = SseEvent::default()
            .json_data(&event)
            .unwrap_or_else(|_| SseEvent::default().data("{}"));
        Ok(frame)
    });

    Sse::new(sse_events).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("keepalive"))
}

//! Server-Sent Events rendering of storyboard streams.
//!
//! Each [`StreamEvent`] becomes one named SSE event with a JSON data line.
//! The response stream owns the replay stream; when the client disconnects
//! axum drops both, which releases the broadcast receiver and the
//! keep-alive timer together.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{BoxStream, Stream, StreamExt};
use storyboard_events::StreamEvent;

/// Render a single stream event, or `None` if its payload fails to encode.
pub fn to_sse_event(event: &StreamEvent) -> Option<Event> {
    match event.data_json() {
        Ok(data) => Some(Event::default().event(event.name()).data(data)),
        Err(e) => {
            tracing::error!(
                storyboard_id = %event.payload.storyboard_id,
                event = event.name(),
                error = %e,
                "Failed to encode stream event"
            );
            None
        }
    }
}

/// Wrap a replay stream as an SSE response with periodic keep-alive
/// comments.
pub fn event_stream(
    events: BoxStream<'static, StreamEvent>,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = events.filter_map(|event| async move { to_sse_event(&event).map(Ok) });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive))
}

//! Server-Sent Events support for the streaming chat endpoint

use crate::relay::RelayEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// End-of-turn control token, never part of reply content
pub const END_SENTINEL: &str = "[END]";

/// Terminal failure marker, distinct from [`END_SENTINEL`] so clients can
/// tell a failed turn from a completed one
pub const ERROR_SENTINEL: &str = "[ERROR]";

/// Convert a relay event channel into the wire stream: one `data:` event
/// per fragment, closed by the end or error sentinel. The connection
/// closes when the relay drops its sender.
pub fn relay_sse(
    events: tokio::sync::mpsc::Receiver<RelayEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(events).map(|event| Ok(relay_event_to_sse(event)));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn relay_event_to_sse(event: RelayEvent) -> Event {
    match event {
        RelayEvent::Fragment(text) => Event::default().data(text),
        RelayEvent::Done => Event::default().data(END_SENTINEL),
        RelayEvent::Failed { message } => {
            Event::default().data(format!("{ERROR_SENTINEL} {message}"))
        }
    }
}

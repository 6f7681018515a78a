use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::{
    StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    state::{SharedState, SseHub},
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Logs once the response stream owning it is dropped.
struct DisconnectLog;

impl Drop for DisconnectLog {
    fn drop(&mut self) {
        info!("Public SSE stream disconnected");
    }
}

/// Turn a broadcast receiver into an SSE response. Lagging clients skip the
/// events they missed instead of being disconnected.
pub fn to_sse_stream(
    receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let disconnect = DisconnectLog;
    let stream = BroadcastStream::new(receiver).filter_map(move |message| {
        let _owned = &disconnect;
        match message {
            Ok(payload) => Some(Ok(to_event(payload))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "public SSE subscriber lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Send a human-readable info message onto the public SSE stream.
pub fn broadcast_public_info(hub: &SseHub, message: &str) {
    hub.broadcast(ServerEvent::new(
        Some("info".to_string()),
        message.to_string(),
    ));
}

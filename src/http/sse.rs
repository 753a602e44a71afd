//! Server-Sent Events stream of arena notifications

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::events::ArenaEvent;

/// Encode one event; named by its kind, JSON body
pub fn to_sse(event: &ArenaEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(err) => {
            warn!(event = event.name(), error = %err, "Failed to encode event");
            Event::default().event("error").data(err.to_string())
        }
    }
}

pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.arena.events().subscribe();
    debug!(subscribers = state.arena.events().subscriber_count(), "SSE subscriber connected");

    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => Some(Ok::<_, Infallible>(to_sse(&event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "SSE subscriber lagged, events dropped");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

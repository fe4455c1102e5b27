//! Server-Sent Events (SSE) stream
//!
//! Streams real-time player events to connected clients. Each connection
//! starts with an `InitialState` snapshot, then receives every event
//! published after it subscribed.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tod_common::events::TodEvent;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before taking the snapshot so nothing falls in between
    let rx = ctx.orchestrator.subscribe();
    let initial = TodEvent::InitialState {
        snapshot: ctx.orchestrator.snapshot().await,
        timestamp: chrono::Utc::now(),
    };

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                // Lagged subscriber: skip what was missed
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    let stream = stream::once(async move { initial })
        .chain(updates)
        .filter_map(|event| async move { to_sse_event(&event).map(Ok) });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &TodEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

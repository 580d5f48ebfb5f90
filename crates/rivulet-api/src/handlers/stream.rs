use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::state::{AppState, FeedEvent};

/// Stream the signal using Server-Sent Events
///
/// Every event is `data: [[x, y], ...]` with an increasing `id`. A client
/// that falls more than `emitter.channel_capacity` events behind skips the
/// missed ones and carries on from the newest.
#[utoipa::path(
    get,
    path = "/data",
    responses(
        (status = 200, description = "Streaming points", content_type = "text/event-stream")
    ),
    tag = "data"
)]
pub async fn data_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connection_id = Uuid::new_v4();
    let receiver = state.feed.subscribe();

    tracing::info!(
        connection_id = %connection_id,
        subscribers = state.subscribers(),
        "client subscribed to /data"
    );

    let sse_stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) => to_sse_event(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(connection_id = %connection_id, skipped, "slow client skipped events");
            None
        }
    });

    Sse::new(sse_stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(state.config.emitter.keep_alive_secs)),
    )
}

fn to_sse_event(event: &FeedEvent) -> Option<Event> {
    match Event::default()
        .id(event.id.to_string())
        .json_data(event.batch.records())
    {
        Ok(sse_event) => Some(sse_event),
        Err(e) => {
            tracing::error!(id = event.id, error = %e, "failed to encode event");
            None
        }
    }
}

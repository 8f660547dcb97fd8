//! SSE progress endpoint.
//!
//! GET /api/scrape/stream/:session_id
//!
//! The first event is a `progress` snapshot of every site, so a client that
//! connects (or reconnects) mid-session never needs replayed history. Live
//! messages follow, each sent as an event named after its `type`. The stream
//! ends after `complete`; for a finished session that is immediately after
//! the snapshot.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};

use scrape_engine::StreamMessage;

use crate::server::app::AppState;
use crate::server::error::{parse_session_id, ApiError};

pub async fn stream_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = parse_session_id(&session_id)?;

    // Subscribe before snapshotting so nothing falls between the two
    let subscription = state.manager.subscribe(session_id)?;
    let snapshot = state.manager.status(session_id)?;

    let initial = StreamMessage::Progress {
        data: snapshot.progress,
    };

    let live = if snapshot.status.is_terminal() {
        state.manager.bus().unsubscribe(subscription);
        stream::iter(vec![StreamMessage::Complete]).boxed()
    } else {
        subscription.boxed()
    };

    tracing::debug!(session_id = %session_id, "progress stream opened");

    let events = stream::once(async move { initial })
        .chain(live)
        .filter_map(|message| async move {
            Event::default()
                .event(message.kind())
                .json_data(&message)
                .ok()
                .map(Ok)
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

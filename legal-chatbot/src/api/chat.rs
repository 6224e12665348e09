use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::components::AppState;
use crate::core::Result;
use crate::services::{ChatReply, ChatRequest, ChatStreamEvent};

pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    Ok(Json(state.chat.chat(id, request).await?))
}

fn to_sse(event: &ChatStreamEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default()
            .event("error")
            .data(serde_json::json!({ "type": "error", "detail": e.to_string() }).to_string()),
    }
}

/// `text/event-stream` of `meta`, `token`, then `done` or `error` events.
pub async fn chat_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let events = state.chat.chat_stream(id, request).await?;
    let stream = ReceiverStream::new(events).map(|event| Ok::<_, Infallible>(to_sse(&event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use storage::{ConversationRecord, ConversationSummary, MessageRecord};
use uuid::Uuid;

use crate::components::AppState;
use crate::core::Result;
use crate::services::{ConversationDetail, ListParams};

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversation {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameConversation {
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    pub limit: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    body: Option<Json<CreateConversation>>,
) -> Result<(StatusCode, Json<ConversationRecord>)> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let conversation = state.conversations.create(body.title.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.conversations.list(params).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetail>> {
    Ok(Json(state.conversations.detail(id).await?))
}

pub async fn rename(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameConversation>,
) -> Result<Json<ConversationRecord>> {
    Ok(Json(state.conversations.rename(id, &body.title).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.conversations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MessageParams>,
) -> Result<Json<Vec<MessageRecord>>> {
    Ok(Json(state.conversations.messages(id, params.limit).await?))
}

use axum::extract::{Path, State};
use axum::Json;
use graphrag::{GraphSummary, KnowledgeGraph};
use uuid::Uuid;

use crate::components::AppState;
use crate::core::Result;

pub async fn data(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<KnowledgeGraph>> {
    state.conversations.require(id).await?;
    Ok(Json(state.graphrag.knowledge_graph(id).await?))
}

pub async fn summary(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<GraphSummary>> {
    state.conversations.require(id).await?;
    Ok(Json(state.graphrag.graph_summary(id).await?))
}

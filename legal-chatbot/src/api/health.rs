use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use storage::ConversationRepository;
use tracing::warn;

use crate::components::AppState;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/health",
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthParams {
    #[serde(default)]
    pub deep: bool,
}

/// Always 200; the body reports which dependencies are reachable.
pub async fn health(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> Json<Value> {
    let database = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "unavailable"
        }
    };
    let mut body = json!({
        "status": "ok",
        "app": state.app_name,
        "database": database,
        "llm": state.llm.model_info(),
    });
    if params.deep {
        body["llm_available"] = json!(state.llm.health_check().await);
    }
    Json(body)
}

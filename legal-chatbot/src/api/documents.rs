use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use graphrag::IndexStats;
use storage::DocumentRecord;
use tracing::debug;
use uuid::Uuid;

use crate::components::AppState;
use crate::core::{ApiError, Result};
use crate::services::{DocumentList, IndexStarted, UploadedFile};

const FILE_FIELD: &str = "file";

/// Multipart upload; the file is read from the `file` field.
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRecord>)> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge {
                    size: state.max_upload_bytes + 1,
                    limit: state.max_upload_bytes,
                }
            } else {
                ApiError::BadRequest(format!("Failed to read upload: {}", e))
            }
        })?;
        file = Some(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let file = file.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    let record = state.documents.upload(id, file).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<DocumentList>> {
    Ok(Json(state.documents.list(id).await?))
}

pub async fn status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<IndexStats>> {
    Ok(Json(state.documents.status(id).await?))
}

pub async fn index(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<IndexStarted>)> {
    let started = state.documents.start_indexing(id).await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.documents.delete(id, document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Document uploads, listing, deletion and background index builds.

use graphrag::{GraphRagService, IndexStats, IndexingGuard};
use serde::Serialize;
use std::sync::Arc;
use storage::{
    ChatStore, ConversationRepository, DocumentRecord, DocumentRepository, DocumentStatus,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::{ApiError, Result};
use crate::extract;

/// One file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentRecord>,
    pub stats: IndexStats,
}

/// Body of the 202 returned when an index build starts.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStarted {
    pub conversation_id: Uuid,
    pub status: &'static str,
    pub document_count: usize,
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn ChatStore>,
    graphrag: Arc<GraphRagService>,
    max_upload_bytes: usize,
    auto_index: bool,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        graphrag: Arc<GraphRagService>,
        max_upload_bytes: usize,
        auto_index: bool,
    ) -> Self {
        Self {
            store,
            graphrag,
            max_upload_bytes,
            auto_index,
        }
    }

    async fn require_conversation(&self, conversation_id: Uuid) -> Result<()> {
        match self.store.get_conversation(conversation_id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("Conversation", conversation_id)),
        }
    }

    /// Extracts text, writes it to the GraphRAG input directory and records a `pending` row.
    pub async fn upload(&self, conversation_id: Uuid, file: UploadedFile) -> Result<DocumentRecord> {
        self.require_conversation(conversation_id).await?;
        let filename = file.filename.trim().to_string();
        if filename.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file has no name".to_string()));
        }
        let size = file.bytes.len();
        if size > self.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        info!(
            conversation_id = %conversation_id,
            file = %filename,
            size_bytes = size,
            "step: document upload received"
        );

        let name = filename.clone();
        let bytes = file.bytes;
        let text = tokio::task::spawn_blocking(move || extract::extract_clean_text(&bytes, &name))
            .await
            .map_err(|e| ApiError::Internal(format!("Text extraction task failed: {}", e)))??;

        let saved = self
            .graphrag
            .save_document(conversation_id, &filename, &text)
            .await?;
        let record = DocumentRecord::new(
            conversation_id,
            filename,
            saved.file_name.clone(),
            file.content_type,
            size as i64,
            saved.char_count as i64,
        );
        if let Err(e) = self.store.save_document(&record).await {
            if let Err(cleanup) = self
                .graphrag
                .remove_document(conversation_id, &saved.file_name)
                .await
            {
                warn!(file = %saved.file_name, error = %cleanup, "Failed to remove orphaned document file");
            }
            return Err(e.into());
        }
        info!(
            conversation_id = %conversation_id,
            document_id = %record.id,
            stored_filename = %record.stored_filename,
            chars = record.char_count,
            "step: document stored"
        );

        if self.auto_index {
            self.spawn_auto_index(conversation_id);
        }
        Ok(record)
    }

    pub async fn list(&self, conversation_id: Uuid) -> Result<DocumentList> {
        self.require_conversation(conversation_id).await?;
        Ok(DocumentList {
            documents: self.store.list_documents(conversation_id).await?,
            stats: self.graphrag.index_stats(conversation_id).await,
        })
    }

    pub async fn status(&self, conversation_id: Uuid) -> Result<IndexStats> {
        self.require_conversation(conversation_id).await?;
        Ok(self.graphrag.index_stats(conversation_id).await)
    }

    /// Starts a background index build. 400 without documents, 409 when one is running.
    pub async fn start_indexing(&self, conversation_id: Uuid) -> Result<IndexStarted> {
        self.require_conversation(conversation_id).await?;
        let documents = self.graphrag.list_documents(conversation_id).await?;
        if documents.is_empty() {
            return Err(graphrag::GraphRagError::NoDocuments.into());
        }
        let guard = self
            .graphrag
            .try_begin_indexing(conversation_id)
            .ok_or(graphrag::GraphRagError::AlreadyIndexing(conversation_id))?;
        self.spawn_index(guard);
        Ok(IndexStarted {
            conversation_id,
            status: "indexing",
            document_count: documents.len(),
        })
    }

    /// Removes the file and the row, then rebuilds or clears the index. While a build is
    /// running the change is queued behind it instead.
    pub async fn delete(&self, conversation_id: Uuid, document_id: Uuid) -> Result<()> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| d.conversation_id == conversation_id)
            .ok_or_else(|| ApiError::not_found("Document", document_id))?;

        self.graphrag
            .remove_document(conversation_id, &document.stored_filename)
            .await?;
        self.store.delete_document(document_id).await?;
        info!(
            conversation_id = %conversation_id,
            document_id = %document_id,
            file = %document.filename,
            "step: document deleted"
        );

        let remaining = self.store.list_documents(conversation_id).await?;
        if self.auto_index && !remaining.is_empty() {
            self.spawn_auto_index(conversation_id);
            return Ok(());
        }
        let Some(guard) = self.graphrag.request_index(conversation_id) else {
            info!(
                conversation_id = %conversation_id,
                "Index build running, it will rebuild without the deleted document"
            );
            return Ok(());
        };
        self.graphrag.clear_index(conversation_id).await?;
        if !remaining.is_empty() {
            self.store
                .set_conversation_document_status(conversation_id, DocumentStatus::Pending, None)
                .await?;
        }
        drop(guard);
        Ok(())
    }

    fn spawn_auto_index(&self, conversation_id: Uuid) {
        match self.graphrag.request_index(conversation_id) {
            Some(guard) => self.spawn_index(guard),
            None => info!(
                conversation_id = %conversation_id,
                "Index build already running, rebuild queued"
            ),
        }
    }

    fn spawn_index(&self, guard: IndexingGuard) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_index(guard).await;
        });
    }

    /// Builds the index while holding `guard`, again for as long as documents keep changing
    /// mid-build. Only documents a successful build read are marked `indexed`.
    pub async fn run_index(&self, mut guard: IndexingGuard) {
        loop {
            self.run_build(&guard).await;
            match self.graphrag.finish_build(guard).await {
                Some(next) => guard = next,
                None => break,
            }
        }
    }

    async fn run_build(&self, guard: &IndexingGuard) {
        let conversation_id = guard.conversation_id();
        if let Err(e) = self
            .store
            .set_conversation_document_status(conversation_id, DocumentStatus::Indexing, None)
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to mark documents as indexing");
        }

        let result = match self.graphrag.build_index_guarded(guard).await {
            Ok(report) => {
                info!(
                    conversation_id = %conversation_id,
                    documents = report.document_count,
                    artifacts = report.artifact_count,
                    "step: index build finished"
                );
                self.mark_built(conversation_id, &report.files).await
            }
            Err(graphrag::GraphRagError::NoDocuments) => {
                info!(conversation_id = %conversation_id, "No documents left, clearing index");
                self.graphrag.clear_index(conversation_id).await.map_err(ApiError::from)
            }
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "Index build failed");
                let detail = e.to_string();
                self.store
                    .set_conversation_document_status(
                        conversation_id,
                        DocumentStatus::Failed,
                        Some(&detail),
                    )
                    .await
                    .map(|_| ())
                    .map_err(ApiError::from)
            }
        };
        if let Err(e) = result {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to record index status");
        }
    }

    /// `indexed` for documents in `files`; the rest go back to `pending` for the next build.
    async fn mark_built(&self, conversation_id: Uuid, files: &[String]) -> Result<()> {
        for document in self.store.list_documents(conversation_id).await? {
            let status = if files.contains(&document.stored_filename) {
                DocumentStatus::Indexed
            } else {
                DocumentStatus::Pending
            };
            self.store
                .update_document_status(document.id, status, None)
                .await?;
        }
        Ok(())
    }
}

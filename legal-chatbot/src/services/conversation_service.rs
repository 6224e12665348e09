//! Conversation CRUD on top of the store; deletion also removes the GraphRAG workspace.

use graphrag::GraphRagService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{
    ChatStore, ConversationRecord, ConversationRepository, ConversationSummary, DocumentRecord,
    DocumentRepository, MessageRecord, MessageRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::{ApiError, Result};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// `?limit=&offset=` for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Conversation with its messages (chronological) and documents.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationRecord,
    pub messages: Vec<MessageRecord>,
    pub documents: Vec<DocumentRecord>,
}

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ChatStore>,
    graphrag: Arc<GraphRagService>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ChatStore>, graphrag: Arc<GraphRagService>) -> Self {
        Self { store, graphrag }
    }

    pub async fn create(&self, title: Option<&str>) -> Result<ConversationRecord> {
        let conversation = self
            .store
            .create_conversation(title.unwrap_or_default())
            .await?;
        info!(conversation_id = %conversation.id, title = %conversation.title, "Conversation created");
        Ok(conversation)
    }

    pub async fn list(&self, params: ListParams) -> Result<Vec<ConversationSummary>> {
        Ok(self
            .store
            .list_conversations(params.limit(), params.offset())
            .await?)
    }

    /// The conversation or 404.
    pub async fn require(&self, id: Uuid) -> Result<ConversationRecord> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Conversation", id))
    }

    pub async fn detail(&self, id: Uuid) -> Result<ConversationDetail> {
        let conversation = self.require(id).await?;
        let messages = self.store.list_messages(id, None).await?;
        let documents = self.store.list_documents(id).await?;
        Ok(ConversationDetail {
            conversation,
            messages,
            documents,
        })
    }

    pub async fn messages(&self, id: Uuid, limit: Option<i64>) -> Result<Vec<MessageRecord>> {
        self.require(id).await?;
        let limit = limit.map(|l| l.clamp(1, MAX_LIST_LIMIT * 5));
        Ok(self.store.list_messages(id, limit).await?)
    }

    pub async fn rename(&self, id: Uuid, title: &str) -> Result<ConversationRecord> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::BadRequest("Title must not be empty".to_string()));
        }
        self.store
            .update_title(id, title)
            .await?
            .ok_or_else(|| ApiError::not_found("Conversation", id))
    }

    /// Deletes rows (messages and documents cascade) and the GraphRAG workspace.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_conversation(id).await? {
            return Err(ApiError::not_found("Conversation", id));
        }
        if let Err(e) = self.graphrag.delete_conversation_data(id).await {
            warn!(conversation_id = %id, error = %e, "Failed to delete GraphRAG data");
        }
        info!(conversation_id = %id, "Conversation deleted");
        Ok(())
    }
}

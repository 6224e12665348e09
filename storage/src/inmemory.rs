//! In-memory implementation of the repository traits.
//!
//! Keeps insertion order so listings match the PostgreSQL ordering. Used by tests
//! and by `--in-memory` runs that have no database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{
    ConversationRecord, ConversationSummary, DocumentRecord, DocumentStatus, MessageRecord,
};
use crate::repository::{ConversationRepository, DocumentRepository, MessageRepository};

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, ConversationRecord>,
    messages: Vec<MessageRecord>,
    documents: Vec<DocumentRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, StorageError> {
        let conversation = ConversationRecord::new(title);
        self.inner
            .write()
            .await
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<ConversationRecord>, StorageError> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn list_conversations(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationSummary>, StorageError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<&ConversationRecord> = inner.conversations.values().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let summaries = conversations
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                created_at: c.created_at,
                updated_at: c.updated_at,
                message_count: inner
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == c.id)
                    .count() as i64,
                document_count: inner
                    .documents
                    .iter()
                    .filter(|d| d.conversation_id == c.id)
                    .count() as i64,
            })
            .collect();
        Ok(summaries)
    }

    async fn update_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StorageError> {
        let mut inner = self.inner.write().await;
        Ok(inner.conversations.get_mut(&id).map(|c| {
            c.title = title.to_string();
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn touch_conversation(&self, id: Uuid) -> Result<(), StorageError> {
        if let Some(c) = self.inner.write().await.conversations.get_mut(&id) {
            c.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().await;
        let existed = inner.conversations.remove(&id).is_some();
        inner.messages.retain(|m| m.conversation_id != id);
        inner.documents.retain(|d| d.conversation_id != id);
        Ok(existed)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn save_message(&self, message: &MessageRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| {
                StorageError::NotFound(format!("conversation {}", message.conversation_id))
            })?;
        conversation.updated_at = message.created_at;
        inner.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let inner = self.inner.read().await;
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let inner = self.inner.read().await;
        let all: Vec<&MessageRecord> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        let skip = all.len().saturating_sub(limit.max(0) as usize);
        Ok(all.into_iter().skip(skip).cloned().collect())
    }

    async fn count_messages(&self, conversation_id: Uuid) -> Result<i64, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as i64)
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn save_document(&self, document: &DocumentRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.conversations.contains_key(&document.conversation_id) {
            return Err(StorageError::NotFound(format!(
                "conversation {}",
                document.conversation_id
            )));
        }
        inner.documents.push(document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .iter()
            .filter(|d| d.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let document = inner
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("document {}", id)))?;
        document.status = status;
        document.error = error.map(str::to_string);
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn set_conversation_document_status(
        &self,
        conversation_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for document in inner
            .documents
            .iter_mut()
            .filter(|d| d.conversation_id == conversation_id)
        {
            document.status = status;
            document.error = error.map(str::to_string);
            document.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().await;
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        Ok(inner.documents.len() != before)
    }
}

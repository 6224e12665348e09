//! Repository traits implemented by [`crate::PgStore`] and [`crate::InMemoryStore`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{
    ConversationRecord, ConversationSummary, DocumentRecord, DocumentStatus, MessageRecord,
};

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, StorageError>;
    async fn get_conversation(&self, id: Uuid) -> Result<Option<ConversationRecord>, StorageError>;
    /// Most recently updated first.
    async fn list_conversations(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationSummary>, StorageError>;
    /// Returns `None` when the conversation does not exist.
    async fn update_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StorageError>;
    async fn touch_conversation(&self, id: Uuid) -> Result<(), StorageError>;
    /// Deletes the conversation with its messages and documents. Returns false if it did not exist.
    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StorageError>;
    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Saves the message and bumps the conversation's `updated_at`.
    async fn save_message(&self, message: &MessageRecord) -> Result<(), StorageError>;
    /// Chronological order; `limit` keeps the first N.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MessageRecord>, StorageError>;
    /// The last `limit` messages, returned in chronological order.
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, StorageError>;
    async fn count_messages(&self, conversation_id: Uuid) -> Result<i64, StorageError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn save_document(&self, document: &DocumentRecord) -> Result<(), StorageError>;
    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StorageError>;
    /// Upload order.
    async fn list_documents(&self, conversation_id: Uuid)
        -> Result<Vec<DocumentRecord>, StorageError>;
    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<(), StorageError>;
    /// Sets the status of every document in a conversation; returns the number updated.
    async fn set_conversation_document_status(
        &self,
        conversation_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<u64, StorageError>;
    async fn delete_document(&self, id: Uuid) -> Result<bool, StorageError>;
}

/// Everything the chat backend needs from persistence.
pub trait ChatStore: ConversationRepository + MessageRepository + DocumentRepository {}

impl<T> ChatStore for T where T: ConversationRepository + MessageRepository + DocumentRepository {}

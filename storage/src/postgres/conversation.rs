use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::PgStore;
use crate::error::StorageError;
use crate::models::{ConversationRecord, ConversationSummary};
use crate::repository::ConversationRepository;

#[async_trait]
impl ConversationRepository for PgStore {
    async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, StorageError> {
        let conversation = ConversationRecord::new(title);

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(conversation.id)
        .bind(&conversation.title)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(self.pool())
        .await?;

        info!(conversation_id = %conversation.id, title = %conversation.title, "Created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<ConversationRecord>, StorageError> {
        let conversation = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(conversation)
    }

    async fn list_conversations(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConversationSummary>, StorageError> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT c.id, c.title, c.created_at, c.updated_at,
                (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count,
                (SELECT COUNT(*) FROM documents d WHERE d.conversation_id = c.id) AS document_count
            FROM conversations c
            ORDER BY c.updated_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        info!("Retrieved {} conversations", conversations.len());
        Ok(conversations)
    }

    async fn update_title(
        &self,
        id: Uuid,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StorageError> {
        let conversation = sqlx::query_as::<_, ConversationRecord>(
            r#"
            UPDATE conversations SET title = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, title, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;

        Ok(conversation)
    }

    async fn touch_conversation(&self, id: Uuid) -> Result<(), StorageError> {
        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        info!(
            conversation_id = %id,
            deleted = result.rows_affected(),
            "Deleted conversation"
        );
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        PgStore::ping(self).await?;
        Ok(())
    }
}

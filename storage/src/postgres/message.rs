use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::PgStore;
use crate::error::StorageError;
use crate::models::MessageRecord;
use crate::repository::MessageRepository;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, used_rag, retrieval_method, created_at";

#[async_trait]
impl MessageRepository for PgStore {
    async fn save_message(&self, message: &MessageRecord) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, used_rag, retrieval_method, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.used_rag)
        .bind(&message.retrieval_method)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(message.conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            role = %message.role,
            content_len = message.content.len(),
            "Saved message"
        );
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let mut sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC, seq ASC",
            MESSAGE_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        let messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await?;

        info!("Retrieved {} messages", messages.len());
        Ok(messages)
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let sql = format!(
            r#"
            SELECT {cols} FROM (
                SELECT {cols}, seq FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC, seq DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, seq ASC
            "#,
            cols = MESSAGE_COLUMNS
        );

        let messages = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(conversation_id)
            .bind(limit.max(0))
            .fetch_all(self.pool())
            .await?;

        info!(
            "Retrieved {} recent messages for conversation {}",
            messages.len(),
            conversation_id
        );
        Ok(messages)
    }

    async fn count_messages(&self, conversation_id: Uuid) -> Result<i64, StorageError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count.0)
    }
}

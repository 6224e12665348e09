use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::PgStore;
use crate::error::StorageError;
use crate::models::{DocumentRecord, DocumentStatus};
use crate::repository::DocumentRepository;

const DOCUMENT_COLUMNS: &str = "id, conversation_id, filename, stored_filename, content_type, \
     size_bytes, char_count, status, error, created_at, updated_at";

#[async_trait]
impl DocumentRepository for PgStore {
    async fn save_document(&self, document: &DocumentRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, conversation_id, filename, stored_filename, content_type,
                size_bytes, char_count, status, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.id)
        .bind(document.conversation_id)
        .bind(&document.filename)
        .bind(&document.stored_filename)
        .bind(&document.content_type)
        .bind(document.size_bytes)
        .bind(document.char_count)
        .bind(document.status.as_str())
        .bind(&document.error)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(self.pool())
        .await?;

        info!(
            document_id = %document.id,
            conversation_id = %document.conversation_id,
            filename = %document.filename,
            "Saved document"
        );
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, StorageError> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        let document = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(document)
    }

    async fn list_documents(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM documents WHERE conversation_id = $1 ORDER BY created_at ASC, seq ASC",
            DOCUMENT_COLUMNS
        );
        let documents = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(conversation_id)
            .fetch_all(self.pool())
            .await?;
        Ok(documents)
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE documents SET status = $2, error = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    async fn set_conversation_document_status(
        &self,
        conversation_id: Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET status = $2, error = $3, updated_at = $4
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(status.as_str())
        .bind(error)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        info!(
            conversation_id = %conversation_id,
            status = %status,
            updated = result.rows_affected(),
            "Updated document status"
        );
        Ok(result.rows_affected())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

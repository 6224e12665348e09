//! Table definitions, applied idempotently at start-up.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        seq BIGSERIAL,
        conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        used_rag BOOLEAN NOT NULL DEFAULT FALSE,
        retrieval_method TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id UUID PRIMARY KEY,
        seq BIGSERIAL,
        conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        filename TEXT NOT NULL,
        stored_filename TEXT NOT NULL,
        content_type TEXT,
        size_bytes BIGINT NOT NULL,
        char_count BIGINT NOT NULL,
        status TEXT NOT NULL,
        error TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations(updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation_id ON messages(conversation_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_documents_conversation_id ON documents(conversation_id)",
];

/// Prepared statements cannot hold several commands, so each one runs on its own.
pub(super) async fn create_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

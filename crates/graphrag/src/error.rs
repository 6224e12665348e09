//! Error type for GraphRAG workspace operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphRagError {
    #[error("No documents to index")]
    NoDocuments,

    #[error("Failed to read document {file}: {source}")]
    ReadDocument {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Insufficient content for indexing: {chars} characters (minimum 50)")]
    InsufficientContent { chars: usize },

    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("No GraphRAG index found, build the index first")]
    NoIndex,

    #[error("'{0}' CLI not found in PATH (install with: pip install graphrag)")]
    CliNotFound(String),

    #[error("GraphRAG indexing failed (exit code {code:?}): {stderr}")]
    IndexFailed { code: Option<i32>, stderr: String },

    #[error("GraphRAG query failed (exit code {code:?}): {stderr}")]
    QueryFailed { code: Option<i32>, stderr: String },

    #[error("GraphRAG query returned an empty response")]
    EmptyResponse,

    #[error("An index build is already running for conversation {0}")]
    AlreadyIndexing(uuid::Uuid),

    #[error("Knowledge graph not found: {0}")]
    GraphNotFound(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphRagError>;

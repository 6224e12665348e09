//! Storage crate: conversation, message and document persistence.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – ConversationRecord, ConversationSummary, MessageRecord, DocumentRecord
//! - [`repository`] – Repository traits and the combined [`ChatStore`]
//! - [`postgres`] – PgStore and PgPoolManager (PostgreSQL via sqlx)
//! - [`inmemory`] – InMemoryStore (tests and local runs without a database)

mod error;
mod inmemory;
mod models;
mod postgres;
mod repository;

pub use error::StorageError;
pub use inmemory::InMemoryStore;
pub use models::{
    ConversationRecord, ConversationSummary, DocumentRecord, DocumentStatus, MessageRecord,
    MessageRole, DEFAULT_CONVERSATION_TITLE,
};
pub use postgres::{redact_password, PgPoolManager, PgStore};
pub use repository::{ChatStore, ConversationRepository, DocumentRepository, MessageRepository};

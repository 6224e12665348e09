//! Conversation models.
//!
//! Maps to the `conversations` table; summaries add message and document counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to conversations created without one; replaced by the first question.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Creates a new record with a generated UUID; blank titles fall back to the default.
    pub fn new(title: &str) -> Self {
        let title = title.trim();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: if title.is_empty() {
                DEFAULT_CONVERSATION_TITLE.to_string()
            } else {
                title.to_string()
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_CONVERSATION_TITLE
    }
}

/// Row of the conversation listing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
    pub document_count: i64,
}

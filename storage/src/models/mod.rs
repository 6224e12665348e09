mod conversation;
mod document;
mod message;

pub use conversation::{ConversationRecord, ConversationSummary, DEFAULT_CONVERSATION_TITLE};
pub use document::{DocumentRecord, DocumentStatus};
pub use message::{MessageRecord, MessageRole};

//! Services behind the HTTP routes: conversations, chat (smart routing) and documents.

mod chat_service;
mod conversation_service;
mod document_service;

pub use chat_service::{
    derive_title, ChatMode, ChatReply, ChatRequest, ChatService, ChatStreamEvent, RoutingInfo,
    KEYWORD_RETRIEVAL,
};
pub use conversation_service::{ConversationDetail, ConversationService, ListParams};
pub use document_service::{DocumentList, DocumentService, IndexStarted, UploadedFile};

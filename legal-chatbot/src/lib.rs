//! # Legal document chatbot
//!
//! HTTP backend for chatting about legal documents. Wires storage, the LLM client and the
//! GraphRAG workspace into chat and document services and serves them with axum.

pub mod api;
pub mod cli;
pub mod components;
pub mod config;
pub mod core;
pub mod extract;
pub mod runner;
pub mod services;

pub use api::router;
pub use cli::{load_config, Cli, Commands};
pub use components::{build_state, AppState};
pub use config::{AppConfig, AppExtensions, BaseConfig};
pub use core::{init_tracing, ApiError, Result};
pub use runner::{index_conversation, init_database, query_conversation, run_server};
pub use services::{
    ChatMode, ChatReply, ChatRequest, ChatService, ChatStreamEvent, ConversationService,
    DocumentService, RoutingInfo,
};

//! # Prompt
//!
//! Chat message types and every piece of prompt text the chatbot sends to the model.
//!
//! ## Pieces
//!
//! - **System**: [`LEGAL_SYSTEM_PROMPT`] for every answer.
//! - **Routing**: [`routing_system_prompt`] lists the conversation's documents and asks the model
//!   to call the [`SEARCH_DOCUMENTS_TOOL`] only when the question concerns them.
//! - **Retrieval**: [`format_retrieval_prompt`] wraps retrieved excerpts around the question.
//! - **Assembly**: [`build_messages`] orders system → history → current question.
//!
//! ## External interactions
//!
//! - **AI models**: Output is sent to OpenAI-compatible chat completion APIs.

use serde::Deserialize;
use serde_json::{json, Value};

/// Role of a message, one-to-one with OpenAI Chat Completions API `role` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// System instruction (API `role: "system"`).
    System,
    /// User message (API `role: "user"`).
    User,
    /// Assistant message (API `role: "assistant"`).
    Assistant,
}

/// A single chat message, one-to-one with one element of OpenAI `messages` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// System instruction for every legal answer.
pub const LEGAL_SYSTEM_PROMPT: &str = "You are a knowledgeable legal assistant. \
You help users understand legal concepts, contracts and the documents they upload. \
Explain clearly and precisely, and point out ambiguities or risks you notice. \
You do not provide formal legal advice; recommend consulting a qualified lawyer for decisions with legal consequences. \
When your answer relies on document excerpts, cite the document names they come from.";

/// Name of the routing tool the model calls when a question needs the uploaded documents.
pub const SEARCH_DOCUMENTS_TOOL: &str = "search_documents";

/// Description attached to the routing tool.
pub const SEARCH_DOCUMENTS_DESCRIPTION: &str = "Search the documents uploaded to this conversation. \
Use it only when the question concerns the content of those documents.";

/// Retrieval method used when the model does not pick one.
pub const DEFAULT_SEARCH_METHOD: &str = "local";

/// JSON schema of the routing tool's parameters: `{query: string, method: "local" | "global"}`.
pub fn search_documents_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query, rephrased to find the relevant passages"
            },
            "method": {
                "type": "string",
                "enum": ["local", "global"],
                "description": "'local' for specific facts, clauses or entities; 'global' for themes and summaries across all documents"
            }
        },
        "required": ["query"]
    })
}

/// Routing system prompt listing the conversation's document names.
pub fn routing_system_prompt<I, S>(document_names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = document_names
        .into_iter()
        .map(|n| format!("- {}", n.as_ref()))
        .collect();
    let listing = if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join("\n")
    };

    format!(
        "{LEGAL_SYSTEM_PROMPT}\n\n\
The user has uploaded these documents to this conversation:\n{listing}\n\n\
If answering the question requires information from these documents, call the `{SEARCH_DOCUMENTS_TOOL}` tool. \
Use method \"local\" for specific facts, parties, clauses or dates, and \"global\" for overall themes or summaries. \
If the question is general legal knowledge or small talk, answer directly without calling the tool."
    )
}

/// User prompt that puts retrieved excerpts in front of the question.
pub fn format_retrieval_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question using the document excerpts below.\n\
If the excerpts do not contain the answer, say so clearly before adding any general knowledge.\n\n\
Document excerpts:\n{context}\n\n\
Question: {question}"
    )
}

/// Builds the request messages: optional system → history (in order) → current question as User.
pub fn build_messages<I>(system: Option<&str>, history: I, question: &str) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = ChatMessage>,
{
    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    messages.extend(history);
    messages.push(ChatMessage::user(question));
    messages
}

/// Arguments of a `search_documents` call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchDocumentsArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub method: Option<String>,
}

impl SearchDocumentsArgs {
    /// Parses tool-call arguments. Malformed JSON or a blank query fall back to `fallback_query`;
    /// anything other than `local`/`global` becomes [`DEFAULT_SEARCH_METHOD`].
    pub fn parse(arguments: &str, fallback_query: &str) -> Self {
        let mut args: SearchDocumentsArgs =
            serde_json::from_str(arguments).unwrap_or(SearchDocumentsArgs {
                query: String::new(),
                method: None,
            });
        if args.query.trim().is_empty() {
            args.query = fallback_query.to_string();
        }
        args.method = match args.method.as_deref().map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("global") => Some("global".to_string()),
            _ => Some(DEFAULT_SEARCH_METHOD.to_string()),
        };
        args
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or(DEFAULT_SEARCH_METHOD)
    }
}

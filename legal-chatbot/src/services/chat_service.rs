//! Chat service: smart routing between general answers and retrieval over the
//! conversation's documents.
//!
//! A turn is split in two halves so the blocking and streaming endpoints share everything
//! except generation:
//! - [`ChatService::prepare`] validates, stores the user message, titles the conversation
//!   and decides how to answer (general, direct routing reply, or retrieval).
//! - [`ChatService::finish`] stores the assistant message with its retrieval metadata.

use graphrag::{GraphRagService, SearchMethod, DEFAULT_MAX_RESULTS};
use llm_client::{LlmClient, StreamChunk, ToolDefinition};
use prompt::{
    build_messages, format_retrieval_prompt, routing_system_prompt, search_documents_parameters,
    ChatMessage, SearchDocumentsArgs, LEGAL_SYSTEM_PROMPT, SEARCH_DOCUMENTS_DESCRIPTION,
    SEARCH_DOCUMENTS_TOOL,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use storage::{
    ChatStore, ConversationRepository, MessageRecord, MessageRepository, MessageRole,
};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::{ApiError, Result};

/// `retrieval_method` of answers grounded on the keyword fallback.
pub const KEYWORD_RETRIEVAL: &str = "keyword";

const TITLE_MAX_CHARS: usize = 50;
const STREAM_BUFFER: usize = 64;

/// How a question is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// The model decides through the `search_documents` tool.
    #[default]
    Auto,
    /// Never retrieve.
    General,
    /// Always retrieve with the raw question.
    Documents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub mode: ChatMode,
    /// `local` or `global`; overrides the method chosen by the model.
    #[serde(default)]
    pub method: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: ChatMode::Auto,
            method: None,
        }
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Routing decision reported with every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingInfo {
    pub mode: ChatMode,
    pub used_rag: bool,
    pub retrieval_method: Option<String>,
    pub search_query: Option<String>,
    pub tool_called: bool,
}

impl RoutingInfo {
    fn new(mode: ChatMode) -> Self {
        Self {
            mode,
            used_rag: false,
            retrieval_method: None,
            search_query: None,
            tool_called: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub user_message: MessageRecord,
    pub assistant_message: MessageRecord,
    pub routing: RoutingInfo,
}

/// Server-sent events of the streaming endpoint, in order: one `meta`, any number of
/// `token`, then `done` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    Meta {
        user_message: MessageRecord,
        routing: RoutingInfo,
    },
    Token {
        content: String,
    },
    Done {
        message: MessageRecord,
    },
    Error {
        detail: String,
    },
}

impl ChatStreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChatStreamEvent::Meta { .. } => "meta",
            ChatStreamEvent::Token { .. } => "token",
            ChatStreamEvent::Done { .. } => "done",
            ChatStreamEvent::Error { .. } => "error",
        }
    }
}

enum Answer {
    /// Text the routing call already produced.
    Direct(String),
    /// Messages still to be sent to the model.
    Generate(Vec<ChatMessage>),
}

struct PreparedTurn {
    conversation_id: Uuid,
    user_message: MessageRecord,
    routing: RoutingInfo,
    answer: Answer,
}

struct Retrieved {
    context: String,
    method: String,
}

/// Title from the first question: at most 50 characters, cut on a word boundary, with "...".
pub fn derive_title(message: &str) -> String {
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if message.chars().count() <= TITLE_MAX_CHARS {
        return message;
    }
    let head: String = message.chars().take(TITLE_MAX_CHARS).collect();
    let cut = match head.rfind(' ') {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head.as_str(),
    };
    format!("{}...", cut.trim_end())
}

fn to_chat_message(record: &MessageRecord) -> ChatMessage {
    match record.role {
        MessageRole::System => ChatMessage::system(record.content.clone()),
        MessageRole::User => ChatMessage::user(record.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(record.content.clone()),
    }
}

fn search_documents_tool() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_DOCUMENTS_TOOL.to_string(),
        description: SEARCH_DOCUMENTS_DESCRIPTION.to_string(),
        parameters: search_documents_parameters(),
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    llm: Arc<dyn LlmClient>,
    graphrag: Arc<GraphRagService>,
    history_limit: i64,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        llm: Arc<dyn LlmClient>,
        graphrag: Arc<GraphRagService>,
        history_limit: i64,
    ) -> Self {
        Self {
            store,
            llm,
            graphrag,
            history_limit,
        }
    }

    /// Answers one question and returns both stored messages.
    #[instrument(skip(self, request), fields(mode = ?request.mode))]
    pub async fn chat(&self, conversation_id: Uuid, request: ChatRequest) -> Result<ChatReply> {
        let turn = self.prepare(conversation_id, &request).await?;
        let content = match turn.answer {
            Answer::Direct(ref text) => text.clone(),
            Answer::Generate(ref messages) => self
                .llm
                .chat(messages.clone())
                .await
                .map_err(ApiError::llm)?,
        };
        let assistant_message = self.finish(&turn, content).await?;
        Ok(ChatReply {
            user_message: turn.user_message,
            assistant_message,
            routing: turn.routing,
        })
    }

    /// Streaming variant of [`Self::chat`]. Validation errors are returned before any event;
    /// failures after that arrive as a final [`ChatStreamEvent::Error`].
    #[instrument(skip(self, request), fields(mode = ?request.mode))]
    pub async fn chat_stream(
        &self,
        conversation_id: Uuid,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        let turn = self.prepare(conversation_id, &request).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let service = self.clone();
        tokio::spawn(async move {
            let event = match service.stream_turn(&turn, &tx).await {
                Ok(message) => ChatStreamEvent::Done { message },
                Err(e) => {
                    warn!(conversation_id = %turn.conversation_id, error = %e, "Streaming chat failed");
                    ChatStreamEvent::Error {
                        detail: e.to_string(),
                    }
                }
            };
            let _ = tx.send(event).await;
        });
        Ok(rx)
    }

    async fn stream_turn(
        &self,
        turn: &PreparedTurn,
        tx: &mpsc::Sender<ChatStreamEvent>,
    ) -> Result<MessageRecord> {
        tx.send(ChatStreamEvent::Meta {
            user_message: turn.user_message.clone(),
            routing: turn.routing.clone(),
        })
        .await
        .map_err(|_| ApiError::Internal("Client disconnected".to_string()))?;

        let content = match &turn.answer {
            Answer::Direct(text) => {
                tx.send(ChatStreamEvent::Token {
                    content: text.clone(),
                })
                .await
                .map_err(|_| ApiError::Internal("Client disconnected".to_string()))?;
                text.clone()
            }
            Answer::Generate(messages) => {
                let token_tx = tx.clone();
                let mut callback = move |chunk: StreamChunk| -> Pin<
                    Box<dyn Future<Output = anyhow::Result<()>> + Send>,
                > {
                    let tx = token_tx.clone();
                    Box::pin(async move {
                        if !chunk.content.is_empty() {
                            tx.send(ChatStreamEvent::Token {
                                content: chunk.content,
                            })
                            .await
                            .map_err(|_| anyhow::anyhow!("client disconnected"))?;
                        }
                        Ok(())
                    })
                };
                self.llm
                    .chat_stream(messages.clone(), &mut callback)
                    .await
                    .map_err(ApiError::llm)?
            }
        };
        self.finish(turn, content).await
    }

    /// Validation, user message persistence, titling and routing.
    async fn prepare(&self, conversation_id: Uuid, request: &ChatRequest) -> Result<PreparedTurn> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(ApiError::BadRequest("Message must not be empty".to_string()));
        }
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Conversation", conversation_id))?;

        let history: Vec<ChatMessage> = if self.history_limit > 0 {
            self.store
                .recent_messages(conversation_id, self.history_limit)
                .await?
                .iter()
                .map(to_chat_message)
                .collect()
        } else {
            Vec::new()
        };

        let user_message = MessageRecord::user(conversation_id, question);
        self.store.save_message(&user_message).await?;
        info!(
            conversation_id = %conversation_id,
            history = history.len(),
            "step: user message saved"
        );

        if conversation.has_default_title() {
            let title = derive_title(question);
            self.store.update_title(conversation_id, &title).await?;
            debug!(conversation_id = %conversation_id, title = %title, "Conversation titled");
        }

        let requested_method = request.method.as_deref().map(SearchMethod::parse_lenient);
        let (routing, answer) = match request.mode {
            ChatMode::General => (RoutingInfo::new(ChatMode::General), self.general(history, question)),
            ChatMode::Documents => {
                let method = requested_method.unwrap_or_default();
                self.answer_from_documents(
                    RoutingInfo::new(ChatMode::Documents),
                    conversation_id,
                    history,
                    question,
                    question,
                    method,
                )
                .await
            }
            ChatMode::Auto => {
                self.route(conversation_id, history, question, requested_method)
                    .await
            }
        };

        info!(
            conversation_id = %conversation_id,
            used_rag = routing.used_rag,
            tool_called = routing.tool_called,
            retrieval_method = ?routing.retrieval_method,
            "step: routing decided"
        );
        Ok(PreparedTurn {
            conversation_id,
            user_message,
            routing,
            answer,
        })
    }

    fn general(&self, history: Vec<ChatMessage>, question: &str) -> Answer {
        Answer::Generate(build_messages(Some(LEGAL_SYSTEM_PROMPT), history, question))
    }

    /// Auto mode: the model sees the document list and the `search_documents` tool.
    async fn route(
        &self,
        conversation_id: Uuid,
        history: Vec<ChatMessage>,
        question: &str,
        requested_method: Option<SearchMethod>,
    ) -> (RoutingInfo, Answer) {
        let mut routing = RoutingInfo::new(ChatMode::Auto);
        let documents = match self.graphrag.list_documents(conversation_id).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to list documents");
                Vec::new()
            }
        };
        if documents.is_empty() {
            debug!(conversation_id = %conversation_id, "No documents, answering generally");
            return (routing, self.general(history, question));
        }

        let names: Vec<&str> = documents.iter().map(|(name, _)| name.as_str()).collect();
        let system = routing_system_prompt(names);
        let messages = build_messages(Some(&system), history.clone(), question);
        let response = self
            .llm
            .chat_with_tools(messages, &[search_documents_tool()])
            .await;

        match response {
            Ok(response) => {
                if let Some(call) = response
                    .tool_call
                    .filter(|call| call.name == SEARCH_DOCUMENTS_TOOL)
                {
                    let args = SearchDocumentsArgs::parse(&call.arguments, question);
                    let method = requested_method
                        .unwrap_or_else(|| SearchMethod::parse_lenient(args.method()));
                    routing.tool_called = true;
                    info!(
                        conversation_id = %conversation_id,
                        query = %args.query,
                        method = %method,
                        "step: model requested document search"
                    );
                    return self
                        .answer_from_documents(
                            routing,
                            conversation_id,
                            history,
                            &args.query,
                            question,
                            method,
                        )
                        .await;
                }
                match response.content.filter(|c| !c.trim().is_empty()) {
                    Some(content) => (routing, Answer::Direct(content)),
                    None => (routing, self.general(history, question)),
                }
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Routing call failed, searching documents with the question"
                );
                let method = requested_method.unwrap_or_default();
                self.answer_from_documents(
                    routing,
                    conversation_id,
                    history,
                    question,
                    question,
                    method,
                )
                .await
            }
        }
    }

    async fn answer_from_documents(
        &self,
        mut routing: RoutingInfo,
        conversation_id: Uuid,
        history: Vec<ChatMessage>,
        query: &str,
        question: &str,
        method: SearchMethod,
    ) -> (RoutingInfo, Answer) {
        routing.search_query = Some(query.to_string());
        match self.retrieve(conversation_id, query, question, method).await {
            Some(retrieved) => {
                routing.used_rag = true;
                routing.retrieval_method = Some(retrieved.method);
                let prompt = format_retrieval_prompt(&retrieved.context, question);
                (
                    routing,
                    Answer::Generate(build_messages(Some(LEGAL_SYSTEM_PROMPT), history, &prompt)),
                )
            }
            None => {
                info!(conversation_id = %conversation_id, "No relevant context, answering generally");
                (routing, self.general(history, question))
            }
        }
    }

    /// GraphRAG first when an index exists, then keyword search with the search query and
    /// then with the original question.
    async fn retrieve(
        &self,
        conversation_id: Uuid,
        query: &str,
        question: &str,
        method: SearchMethod,
    ) -> Option<Retrieved> {
        if self.graphrag.has_index(conversation_id).await {
            match self.graphrag.query(conversation_id, query, method).await {
                Ok(context) => {
                    return Some(Retrieved {
                        context,
                        method: format!("graphrag_{}", method),
                    })
                }
                Err(e) => warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "GraphRAG query failed, falling back to keyword search"
                ),
            }
        }

        let mut candidates = vec![query];
        if query != question {
            candidates.push(question);
        }
        for candidate in candidates {
            match self
                .graphrag
                .simple_search(conversation_id, candidate, DEFAULT_MAX_RESULTS)
                .await
            {
                Ok(Some(context)) => {
                    return Some(Retrieved {
                        context,
                        method: KEYWORD_RETRIEVAL.to_string(),
                    })
                }
                Ok(None) => {}
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "Keyword search failed"),
            }
        }
        None
    }

    async fn finish(&self, turn: &PreparedTurn, content: String) -> Result<MessageRecord> {
        let mut message = MessageRecord::assistant(turn.conversation_id, content);
        if let Some(method) = turn
            .routing
            .retrieval_method
            .as_ref()
            .filter(|_| turn.routing.used_rag)
        {
            message = message.with_retrieval(method.clone());
        }
        self.store.save_message(&message).await?;
        info!(
            conversation_id = %turn.conversation_id,
            used_rag = message.used_rag,
            chars = message.content.chars().count(),
            "step: assistant message saved"
        );
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(derive_title("  What is a lease?  "), "What is a lease?");
    }

    #[test]
    fn long_titles_cut_on_word_boundary() {
        let title = derive_title(
            "Can my landlord keep the whole security deposit after I moved out early?",
        );
        assert_eq!(title, "Can my landlord keep the whole security deposit...");
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn long_word_is_cut_hard() {
        let title = derive_title(&"x".repeat(80));
        assert_eq!(title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn chat_mode_deserializes_lowercase() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","mode":"documents","method":"global"}"#)
                .unwrap();
        assert_eq!(req.mode, ChatMode::Documents);
        assert_eq!(req.method.as_deref(), Some("global"));

        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.mode, ChatMode::Auto);
    }

    #[test]
    fn stream_events_are_tagged() {
        let event = ChatStreamEvent::Token {
            content: "Hel".to_string(),
        };
        assert_eq!(event.name(), "token");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"type": "token", "content": "Hel"})
        );
    }
}

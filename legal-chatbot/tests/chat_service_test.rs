//! Integration tests for the chat service: routing modes, retrieval fallback, persistence
//! and streaming. Uses InMemoryStore and MockLlmClient; no network. GraphRAG retrieval runs
//! against a shell script standing in for the CLI.

mod common;

use common::{
    test_app, write_index_artifact, MockLlmClient, Routing, TestApp, DEFAULT_REPLY, LEASE_TEXT,
};
#[cfg(unix)]
use common::test_app_with_cli;
use legal_chatbot::services::{ChatMode, ChatRequest, ChatStreamEvent, UploadedFile};
use legal_chatbot::ApiError;
use prompt::{MessageRole, LEGAL_SYSTEM_PROMPT};
use storage::{
    ConversationRepository, MessageRepository, MessageRole as StoredRole,
    DEFAULT_CONVERSATION_TITLE,
};
use uuid::Uuid;

async fn conversation_with_lease(app: &TestApp) -> Uuid {
    let conversation = app.state.conversations.create(None).await.unwrap();
    app.state
        .documents
        .upload(
            conversation.id,
            UploadedFile {
                filename: "lease.txt".to_string(),
                content_type: Some("text/plain".to_string()),
                bytes: LEASE_TEXT.as_bytes().to_vec(),
            },
        )
        .await
        .unwrap();
    conversation.id
}

/// **Test: Without documents auto mode answers generally and never calls the router.**
///
/// **Setup:** Empty conversation; mock replies "Leases are contracts.".
///
/// **Expected:** Reply stored as assistant message with used_rag=false; routing LLM not called;
/// the generation request starts with the legal system prompt and ends with the question.
#[tokio::test]
async fn test_auto_mode_without_documents_answers_generally() {
    let app = test_app(MockLlmClient::new().with_reply("Leases are contracts."), false);
    let conversation = app.state.conversations.create(None).await.unwrap();

    let reply = app
        .state
        .chat
        .chat(conversation.id, ChatRequest::new("What is a lease?"))
        .await
        .unwrap();

    assert_eq!(reply.assistant_message.content, "Leases are contracts.");
    assert!(!reply.assistant_message.used_rag);
    assert!(reply.assistant_message.retrieval_method.is_none());
    assert!(!reply.routing.tool_called);
    assert_eq!(app.llm.routing_calls(), 0);

    let request = app.llm.last_chat_request();
    assert_eq!(request[0].role, MessageRole::System);
    assert_eq!(request[0].content, LEGAL_SYSTEM_PROMPT);
    assert_eq!(request.last().unwrap().content, "What is a lease?");

    let stored = app.store.list_messages(conversation.id, None).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, StoredRole::User);
    assert_eq!(stored[1].role, StoredRole::Assistant);
}

/// **Test: A search_documents tool call retrieves keyword context for the model's query.**
///
/// **Setup:** Conversation with the lease document (no index); router returns a tool call
/// with query "security deposit".
///
/// **Expected:** used_rag=true, retrieval_method "keyword", search_query recorded; the
/// generation prompt contains the lease excerpt and the stored message carries the flags.
#[tokio::test]
async fn test_tool_call_triggers_keyword_retrieval() {
    let llm = MockLlmClient::new()
        .with_routing(Routing::Tool(
            r#"{"query":"security deposit","method":"local"}"#.to_string(),
        ))
        .with_reply("The deposit is two months of rent.");
    let app = test_app(llm, false);
    let conversation_id = conversation_with_lease(&app).await;

    let reply = app
        .state
        .chat
        .chat(
            conversation_id,
            ChatRequest::new("How much deposit do I owe under my lease?"),
        )
        .await
        .unwrap();

    assert!(reply.routing.tool_called);
    assert!(reply.routing.used_rag);
    assert_eq!(reply.routing.retrieval_method.as_deref(), Some("keyword"));
    assert_eq!(reply.routing.search_query.as_deref(), Some("security deposit"));
    assert!(reply.assistant_message.used_rag);
    assert_eq!(
        reply.assistant_message.retrieval_method.as_deref(),
        Some("keyword")
    );

    let routing_request = &app.llm.routing_requests.lock().unwrap()[0];
    assert!(routing_request[0].content.contains("lease.txt"));

    let prompt = app.llm.last_chat_request().last().unwrap().content.clone();
    assert!(prompt.contains("[From: lease.txt]"));
    assert!(prompt.contains("security deposit"));
    assert!(prompt.contains("How much deposit do I owe under my lease?"));
}

/// **Test: A plain routing reply is used as the answer without a second LLM call.**
///
/// **Setup:** Conversation with a document; router replies with text only.
///
/// **Expected:** Assistant content equals the routing reply; chat() never called.
#[tokio::test]
async fn test_routing_reply_is_the_answer() {
    let llm = MockLlmClient::new().with_routing(Routing::Reply("Hello! How can I help?".into()));
    let app = test_app(llm, false);
    let conversation_id = conversation_with_lease(&app).await;

    let reply = app
        .state
        .chat
        .chat(conversation_id, ChatRequest::new("hello"))
        .await
        .unwrap();

    assert_eq!(reply.assistant_message.content, "Hello! How can I help?");
    assert!(!reply.routing.used_rag);
    assert!(!reply.routing.tool_called);
    assert!(app.llm.chat_requests.lock().unwrap().is_empty());
}

/// **Test: A failing routing call falls back to retrieval with the raw question.**
///
/// **Setup:** Router fails; question mentions "security deposit".
///
/// **Expected:** Keyword retrieval used with the original question as search query.
#[tokio::test]
async fn test_routing_failure_falls_back_to_retrieval() {
    let llm = MockLlmClient::new().with_routing(Routing::Fail("rate limited".into()));
    let app = test_app(llm, false);
    let conversation_id = conversation_with_lease(&app).await;

    let reply = app
        .state
        .chat
        .chat(conversation_id, ChatRequest::new("when is the security deposit returned"))
        .await
        .unwrap();

    assert!(reply.routing.used_rag);
    assert!(!reply.routing.tool_called);
    assert_eq!(
        reply.routing.search_query.as_deref(),
        Some("when is the security deposit returned")
    );
}

/// **Test: Documents mode with no matching text answers generally and records used_rag=false.**
///
/// **Setup:** Conversation with the lease; documents mode; question shares no words with it.
///
/// **Expected:** No router call; used_rag=false; general prompt sent.
#[tokio::test]
async fn test_documents_mode_without_matches_answers_generally() {
    let app = test_app(MockLlmClient::new(), false);
    let conversation_id = conversation_with_lease(&app).await;

    let reply = app
        .state
        .chat
        .chat(
            conversation_id,
            ChatRequest::new("xylophone quantum").with_mode(ChatMode::Documents),
        )
        .await
        .unwrap();

    assert_eq!(app.llm.routing_calls(), 0);
    assert!(!reply.routing.used_rag);
    assert_eq!(reply.routing.search_query.as_deref(), Some("xylophone quantum"));
    assert_eq!(reply.assistant_message.content, DEFAULT_REPLY);
    assert_eq!(
        app.llm.last_chat_request().last().unwrap().content,
        "xylophone quantum"
    );
}

/// **Test: General mode skips routing even when documents exist.**
#[tokio::test]
async fn test_general_mode_skips_routing() {
    let app = test_app(MockLlmClient::new(), false);
    let conversation_id = conversation_with_lease(&app).await;

    let reply = app
        .state
        .chat
        .chat(
            conversation_id,
            ChatRequest::new("security deposit").with_mode(ChatMode::General),
        )
        .await
        .unwrap();

    assert_eq!(app.llm.routing_calls(), 0);
    assert!(!reply.routing.used_rag);
    assert!(reply.routing.search_query.is_none());
}

/// **Test: History is sent before the question and the first question titles the conversation.**
///
/// **Setup:** Two turns in a fresh conversation.
///
/// **Expected:** Second request is [system, user1, assistant1, user2]; title derived from the
/// first question and kept afterwards.
#[tokio::test]
async fn test_history_and_title() {
    let llm = MockLlmClient::new()
        .with_reply("First answer.")
        .with_reply("Second answer.");
    let app = test_app(llm, false);
    let conversation = app.state.conversations.create(None).await.unwrap();
    assert_eq!(conversation.title, DEFAULT_CONVERSATION_TITLE);

    app.state
        .chat
        .chat(conversation.id, ChatRequest::new("What is an eviction notice?"))
        .await
        .unwrap();
    app.state
        .chat
        .chat(conversation.id, ChatRequest::new("How long is it valid?"))
        .await
        .unwrap();

    let request = app.llm.last_chat_request();
    let contents: Vec<&str> = request.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            LEGAL_SYSTEM_PROMPT,
            "What is an eviction notice?",
            "First answer.",
            "How long is it valid?"
        ]
    );

    let stored = app
        .store
        .get_conversation(conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "What is an eviction notice?");
}

/// **Test: Validation errors map to 400 / 404 and store nothing.**
#[tokio::test]
async fn test_chat_validation_errors() {
    let app = test_app(MockLlmClient::new(), false);
    let conversation = app.state.conversations.create(None).await.unwrap();

    let err = app
        .state
        .chat
        .chat(conversation.id, ChatRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = app
        .state
        .chat
        .chat(Uuid::new_v4(), ChatRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert_eq!(app.store.count_messages(conversation.id).await.unwrap(), 0);
}

/// **Test: LLM failure surfaces as a 502-mapped error after the user message is stored.**
#[tokio::test]
async fn test_llm_failure_is_bad_gateway() {
    let app = test_app(MockLlmClient::failing(), false);
    let conversation = app.state.conversations.create(None).await.unwrap();

    let err = app
        .state
        .chat
        .chat(conversation.id, ChatRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Llm(_)));
    assert_eq!(err.status().as_u16(), 502);
    assert_eq!(app.store.count_messages(conversation.id).await.unwrap(), 1);
}

/// **Test: Streaming emits meta, token deltas, then done with the stored assistant message.**
///
/// **Setup:** Mock reply "The answer is yes." streamed word by word.
///
/// **Expected:** First event meta, concatenated tokens equal the reply, last event done whose
/// message id matches the stored assistant row.
#[tokio::test]
async fn test_stream_event_order() {
    let app = test_app(MockLlmClient::new().with_reply("The answer is yes."), false);
    let conversation = app.state.conversations.create(None).await.unwrap();

    let mut rx = app
        .state
        .chat
        .chat_stream(conversation.id, ChatRequest::new("Is it legal?"))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(ChatStreamEvent::Meta { .. })));
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            ChatStreamEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "The answer is yes.");

    let done_id = match events.last() {
        Some(ChatStreamEvent::Done { message }) => message.id,
        other => panic!("expected done event, got {:?}", other),
    };
    let stored = app.store.list_messages(conversation.id, None).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].id, done_id);
    assert_eq!(stored[1].content, "The answer is yes.");
}

/// **Test: Streaming LLM failure ends with an error event and no assistant message.**
#[tokio::test]
async fn test_stream_failure_sends_error_event() {
    let app = test_app(MockLlmClient::failing(), false);
    let conversation = app.state.conversations.create(None).await.unwrap();

    let mut rx = app
        .state
        .chat
        .chat_stream(conversation.id, ChatRequest::new("Is it legal?"))
        .await
        .unwrap();

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert!(matches!(last, Some(ChatStreamEvent::Error { .. })));
    assert_eq!(app.store.count_messages(conversation.id).await.unwrap(), 1);
}

/// **Test: A stream whose client went away does not store an assistant message.**
///
/// **Setup:** Conversation with a document; router replies with text; the receiver is dropped
/// before the stream task runs.
///
/// **Expected:** Only the user message is stored.
#[tokio::test]
async fn test_stream_disconnect_keeps_only_user_message() {
    let llm = MockLlmClient::new().with_routing(Routing::Reply("Direct answer.".to_string()));
    let app = test_app(llm, false);
    let conversation_id = conversation_with_lease(&app).await;

    let rx = app
        .state
        .chat
        .chat_stream(conversation_id, ChatRequest::new("Is it legal?"))
        .await
        .unwrap();
    drop(rx);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let stored = app.store.list_messages(conversation_id, None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, StoredRole::User);
}

/// Answers queries with the method and question it was called with; exits 1 otherwise.
#[cfg(unix)]
const ECHO_QUERY_CLI: &str = r#"case "$1" in
  query) echo "GraphRAG context via $7 for: $9"; exit 0 ;;
esac
exit 1"#;

/// **Test: With an index, a tool call is answered from GraphRAG.**
///
/// **Setup:** Lease document plus an index artifact; CLI echoes method and query; router
/// calls search_documents with query "security deposit" and method "local".
///
/// **Expected:** retrieval_method "graphrag_local" on routing and on the stored message; the
/// generation prompt carries the CLI output for the model's query.
#[cfg(unix)]
#[tokio::test]
async fn test_tool_call_uses_graphrag_index() {
    let llm = MockLlmClient::new()
        .with_routing(Routing::Tool(
            r#"{"query":"security deposit","method":"local"}"#.to_string(),
        ))
        .with_reply("Two months of rent.");
    let app = test_app_with_cli(llm, false, ECHO_QUERY_CLI);
    let conversation_id = conversation_with_lease(&app).await;
    write_index_artifact(&app.graphrag, conversation_id);

    let reply = app
        .state
        .chat
        .chat(conversation_id, ChatRequest::new("How much is the deposit?"))
        .await
        .unwrap();

    assert!(reply.routing.used_rag);
    assert_eq!(reply.routing.retrieval_method.as_deref(), Some("graphrag_local"));
    assert_eq!(
        reply.assistant_message.retrieval_method.as_deref(),
        Some("graphrag_local")
    );
    let prompt = app.llm.last_chat_request().last().unwrap().content.clone();
    assert!(prompt.contains("GraphRAG context via local for: security deposit"));
    assert!(prompt.contains("How much is the deposit?"));
}

/// **Test: The request's method overrides the one chosen in the tool call.**
///
/// **Setup:** Indexed conversation; the router asks for "global" twice. The first request
/// has no method, the second asks for "local".
///
/// **Expected:** First answer uses graphrag_global, second graphrag_local, and the CLI is
/// called with the matching --method.
#[cfg(unix)]
#[tokio::test]
async fn test_request_method_overrides_tool_call() {
    let tool = r#"{"query":"termination notice","method":"global"}"#;
    let llm = MockLlmClient::new()
        .with_routing(Routing::Tool(tool.to_string()))
        .with_routing(Routing::Tool(tool.to_string()));
    let app = test_app_with_cli(llm, false, ECHO_QUERY_CLI);
    let conversation_id = conversation_with_lease(&app).await;
    write_index_artifact(&app.graphrag, conversation_id);

    let chosen = app
        .state
        .chat
        .chat(conversation_id, ChatRequest::new("Can the landlord end the lease?"))
        .await
        .unwrap();
    assert_eq!(chosen.routing.retrieval_method.as_deref(), Some("graphrag_global"));
    let prompt = app.llm.last_chat_request().last().unwrap().content.clone();
    assert!(prompt.contains("GraphRAG context via global for: termination notice"));

    let overridden = app
        .state
        .chat
        .chat(
            conversation_id,
            ChatRequest {
                method: Some("local".to_string()),
                ..ChatRequest::new("Can the landlord end the lease?")
            },
        )
        .await
        .unwrap();
    assert_eq!(overridden.routing.retrieval_method.as_deref(), Some("graphrag_local"));
    let prompt = app.llm.last_chat_request().last().unwrap().content.clone();
    assert!(prompt.contains("GraphRAG context via local for: termination notice"));
}

/// **Test: A failing GraphRAG query falls back to keyword search.**
///
/// **Setup:** Indexed conversation; the CLI exits 1 on every call; router asks to search
/// "security deposit".
///
/// **Expected:** used_rag=true with retrieval_method "keyword"; the prompt carries the lease
/// excerpt instead of CLI output.
#[cfg(unix)]
#[tokio::test]
async fn test_graphrag_failure_falls_back_to_keyword() {
    let llm = MockLlmClient::new().with_routing(Routing::Tool(
        r#"{"query":"security deposit","method":"local"}"#.to_string(),
    ));
    let app = test_app_with_cli(llm, false, "echo \"rate limited\" >&2\nexit 1");
    let conversation_id = conversation_with_lease(&app).await;
    write_index_artifact(&app.graphrag, conversation_id);

    let reply = app
        .state
        .chat
        .chat(conversation_id, ChatRequest::new("How much is the deposit?"))
        .await
        .unwrap();

    assert!(reply.routing.used_rag);
    assert_eq!(reply.routing.retrieval_method.as_deref(), Some("keyword"));
    assert_eq!(
        reply.assistant_message.retrieval_method.as_deref(),
        Some("keyword")
    );
    let prompt = app.llm.last_chat_request().last().unwrap().content.clone();
    assert!(prompt.contains("[From: lease.txt]"));
    assert!(!prompt.contains("rate limited"));
}

//! Component factory: builds the shared [`AppState`] from config. Isolates assembly logic from runner.

use anyhow::Result;
use graphrag::GraphRagService;
use llm_client::{LlmClient, OpenAILlmClient};
use std::sync::Arc;
use storage::{ChatStore, InMemoryStore, PgStore};
use tracing::{error, info, instrument};

use crate::config::AppConfig;
use crate::services::{ChatService, ConversationService, DocumentService};

/// Everything the HTTP handlers need; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub store: Arc<dyn ChatStore>,
    pub llm: Arc<dyn LlmClient>,
    pub graphrag: Arc<GraphRagService>,
    pub conversations: ConversationService,
    pub chat: ChatService,
    pub documents: DocumentService,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires the services around already-built store, LLM client and GraphRAG service.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ChatStore>,
        llm: Arc<dyn LlmClient>,
        graphrag: Arc<GraphRagService>,
    ) -> Self {
        let base = config.base();
        Self {
            app_name: base.app_name.clone(),
            conversations: ConversationService::new(store.clone(), graphrag.clone()),
            chat: ChatService::new(
                store.clone(),
                llm.clone(),
                graphrag.clone(),
                base.chat_history_limit,
            ),
            documents: DocumentService::new(
                store.clone(),
                graphrag.clone(),
                base.max_upload_bytes,
                config.auto_index(),
            ),
            max_upload_bytes: base.max_upload_bytes,
            store,
            llm,
            graphrag,
        }
    }
}

/// PostgreSQL store (schema created on connect), or the in-memory store when `in_memory`.
#[instrument(skip(config))]
pub async fn create_store(config: &AppConfig, in_memory: bool) -> Result<Arc<dyn ChatStore>> {
    if in_memory {
        info!("Using in-memory store (data is lost on exit)");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let store = PgStore::new(config.database_url()).await.map_err(|e| {
        error!(
            error = %e,
            database_url = %storage::redact_password(config.database_url()),
            "Failed to initialize storage"
        );
        anyhow::anyhow!("Failed to initialize storage: {}", e)
    })?;
    Ok(Arc::new(store))
}

/// OpenAI client from the LLM section of the config.
pub fn create_llm_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let client = OpenAILlmClient::from_config(&config.extensions().llm)?;
    Ok(Arc::new(client))
}

/// GraphRAG service with its data directory created.
pub async fn create_graphrag(config: &AppConfig) -> Result<Arc<GraphRagService>> {
    let service = GraphRagService::new(config.extensions().graphrag_config(config.base().debug));
    service.init().await.map_err(|e| {
        error!(error = %e, data_dir = %service.config().data_dir.display(), "Failed to create GraphRAG data dir");
        anyhow::anyhow!("Failed to initialize GraphRAG data dir: {}", e)
    })?;
    Ok(Arc::new(service))
}

/// Builds the full [`AppState`] from config.
pub async fn build_state(config: &AppConfig, in_memory: bool) -> Result<AppState> {
    let store = create_store(config, in_memory).await?;
    let llm = create_llm_client(config)?;
    let graphrag = create_graphrag(config).await?;
    Ok(AppState::new(config, store, llm, graphrag))
}

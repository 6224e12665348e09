//! Entry points behind the CLI subcommands: serve, init-db, index, query.

use anyhow::Result;
use graphrag::SearchMethod;
use tokio::net::TcpListener;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api;
use crate::components::{build_state, create_graphrag, create_store};
use crate::config::AppConfig;
use crate::core::init_tracing;

/// Main entry: init logging, validate config, build components, then serve until Ctrl+C.
#[instrument(skip(config))]
pub async fn run_server(config: AppConfig, in_memory: bool) -> Result<()> {
    init_tracing(config.log_file())?;
    config.validate_for_llm()?;

    info!(
        database = %storage::redact_password(config.database_url()),
        model = %config.openai_model(),
        graphrag_data_dir = %config.extensions().graphrag.data_dir.display(),
        auto_index = config.auto_index(),
        in_memory,
        "Initializing server"
    );

    let state = build_state(&config, in_memory).await?;
    let app = api::router(state);

    let address = config.base().bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "Server started successfully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Connects to PostgreSQL and creates the tables.
pub async fn init_database(config: AppConfig) -> Result<()> {
    init_tracing(config.log_file())?;
    config.validate()?;
    create_store(&config, false).await?;
    info!("Database initialized");
    Ok(())
}

/// Builds one conversation's index in the foreground, recording the outcome on its documents.
pub async fn index_conversation(config: AppConfig, conversation_id: Uuid) -> Result<()> {
    init_tracing(config.log_file())?;
    config.validate_for_llm()?;
    let state = build_state(&config, false).await?;

    let guard = state
        .graphrag
        .try_begin_indexing(conversation_id)
        .ok_or(graphrag::GraphRagError::AlreadyIndexing(conversation_id))?;
    state.documents.run_index(guard).await;

    let stats = state.graphrag.index_stats(conversation_id).await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    if !stats.has_index {
        anyhow::bail!("Index build for {} did not produce artifacts", conversation_id);
    }
    Ok(())
}

/// Runs one GraphRAG query and prints the raw answer.
pub async fn query_conversation(
    config: AppConfig,
    conversation_id: Uuid,
    question: &str,
    method: &str,
) -> Result<()> {
    init_tracing(config.log_file())?;
    config.validate_for_llm()?;
    let graphrag = create_graphrag(&config).await?;
    let answer = graphrag
        .query(conversation_id, question, SearchMethod::parse_lenient(method))
        .await?;
    println!("{}", answer);
    Ok(())
}

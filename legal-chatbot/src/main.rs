//! Binary for the legal chatbot backend.

use anyhow::Result;
use clap::Parser;
use legal_chatbot::{
    index_conversation, init_database, load_config, query_conversation, run_server, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            in_memory,
        } => run_server(load_config(host, port)?, in_memory).await,
        Commands::InitDb => init_database(load_config(None, None)?).await,
        Commands::Index { conversation_id } => {
            index_conversation(load_config(None, None)?, conversation_id).await
        }
        Commands::Query {
            conversation_id,
            question,
            method,
        } => query_conversation(load_config(None, None)?, conversation_id, &question, &method).await,
    }
}

//! CLI parser and config loading.

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "legal-chatbot")]
#[command(about = "Legal document chatbot backend: HTTP API, database setup and GraphRAG tools", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (config from env; flags override HOST/PORT).
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Keep conversations in memory instead of PostgreSQL.
        #[arg(long)]
        in_memory: bool,
    },

    /// Create the database tables and exit.
    InitDb,

    /// Build the GraphRAG index of one conversation in the foreground.
    Index {
        conversation_id: Uuid,
    },

    /// Query the GraphRAG index of one conversation and print the answer.
    Query {
        conversation_id: Uuid,

        question: String,

        /// `local` or `global`.
        #[arg(short, long, default_value = "local")]
        method: String,
    },
}

/// Load AppConfig from environment; `host`/`port` override HOST/PORT when given.
pub fn load_config(host: Option<String>, port: Option<u16>) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    if let Some(host) = host {
        config.base.host = host;
    }
    if let Some(port) = port {
        config.base.port = port;
    }
    Ok(config)
}

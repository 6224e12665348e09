//! App extensions: LLM config (from llm-client) and GraphRAG workspace settings.

use anyhow::{bail, Result};
use graphrag::{GraphRagConfig, DEFAULT_GRAPHRAG_BIN};
use llm_client::{EnvLlmConfig, LlmConfig};
use std::env;
use std::path::PathBuf;

use super::base::parse_bool;

pub const DEFAULT_GRAPHRAG_DATA_DIR: &str = "/app/graphrag_data";

/// GraphRAG settings: GRAPHRAG_DATA_DIR, GRAPHRAG_BIN, GRAPHRAG_AUTO_INDEX.
#[derive(Debug, Clone)]
pub struct GraphRagSettings {
    pub data_dir: PathBuf,
    pub bin: String,
    /// Rebuild the index in the background after uploads and deletions.
    pub auto_index: bool,
}

impl GraphRagSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            data_dir: env::var("GRAPHRAG_DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GRAPHRAG_DATA_DIR.to_string())
                .into(),
            bin: env::var("GRAPHRAG_BIN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GRAPHRAG_BIN.to_string()),
            auto_index: parse_bool("GRAPHRAG_AUTO_INDEX", true)?,
        })
    }
}

/// Extensions: LLM + GraphRAG.
#[derive(Debug, Clone)]
pub struct AppExtensions {
    pub llm: EnvLlmConfig,
    pub graphrag: GraphRagSettings,
}

impl AppExtensions {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            llm: EnvLlmConfig::from_env()?,
            graphrag: GraphRagSettings::from_env()?,
        })
    }

    /// LLM base URL must be a valid URL when set.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.llm.base_url() {
            if reqwest::Url::parse(url).is_err() {
                bail!("OPENAI_BASE_URL is set but not a valid URL: {}", url);
            }
        }
        Ok(())
    }

    /// Workspace config handed to the GraphRAG service; `debug` enables input dumps.
    pub fn graphrag_config(&self, debug: bool) -> GraphRagConfig {
        GraphRagConfig::new(self.graphrag.data_dir.clone())
            .with_bin(self.graphrag.bin.clone())
            .with_api_key(self.llm.api_key())
            .with_base_url(self.llm.base_url().map(str::to_string))
            .with_models(self.llm.model(), self.llm.embedding_model())
            .with_debug(debug)
    }
}

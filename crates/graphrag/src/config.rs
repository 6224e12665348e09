//! Workspace configuration.

use std::path::PathBuf;

pub const DEFAULT_GRAPHRAG_BIN: &str = "graphrag";

/// Where workspaces live, which CLI to run and the model settings handed to it.
#[derive(Debug, Clone)]
pub struct GraphRagConfig {
    pub data_dir: PathBuf,
    pub bin: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    /// Dump input file diagnostics before indexing.
    pub debug: bool,
}

impl GraphRagConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bin: DEFAULT_GRAPHRAG_BIN.to_string(),
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            debug: false,
        }
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_models(mut self, model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        self.model = model.into();
        self.embedding_model = embedding_model.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

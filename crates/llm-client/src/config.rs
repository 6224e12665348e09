//! LLM configuration: trait and env-based implementation.

use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// LLM configuration interface for OpenAI-compatible APIs.
pub trait LlmConfig: Send + Sync {
    fn api_key(&self) -> &str;
    /// `None` means the default OpenAI endpoint.
    fn base_url(&self) -> Option<&str>;
    fn model(&self) -> &str;
    fn embedding_model(&self) -> &str;
    fn timeout(&self) -> Duration;
}

/// LLM config loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvLlmConfig {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub timeout_secs: u64,
}

impl LlmConfig for EnvLlmConfig {
    fn api_key(&self) -> &str {
        &self.openai_api_key
    }
    fn base_url(&self) -> Option<&str> {
        self.openai_base_url.as_deref()
    }
    fn model(&self) -> &str {
        &self.openai_model
    }
    fn embedding_model(&self) -> &str {
        &self.openai_embedding_model
    }
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn non_blank(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl EnvLlmConfig {
    /// Load from environment variables. A missing API key is not an error here; see [`Self::validate`].
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match non_blank("LLM_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("LLM_TIMEOUT_SECS must be a positive integer, got {:?}", v))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            openai_api_key: non_blank("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: non_blank("OPENAI_BASE_URL"),
            openai_model: non_blank("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_embedding_model: non_blank("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            timeout_secs,
        })
    }

    /// Checks what is needed to call the API.
    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            bail!("OPENAI_API_KEY is required");
        }
        if let Some(url) = &self.openai_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("OPENAI_BASE_URL must start with http:// or https://, got {:?}", url);
            }
        }
        if self.timeout_secs == 0 {
            bail!("LLM_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }
}

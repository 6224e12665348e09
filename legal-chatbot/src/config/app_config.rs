//! AppConfig: BaseConfig + AppExtensions. Use load() for env-based loading.

use anyhow::Result;
use llm_client::LlmConfig;

use super::{AppExtensions, BaseConfig};

/// Full application config.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base: BaseConfig,
    pub extensions: AppExtensions,
}

impl AppConfig {
    /// Load full config from environment variables. Call validate() before serving.
    pub fn load() -> Result<Self> {
        let base = BaseConfig::load()?;
        let extensions = AppExtensions::from_env()?;
        Ok(Self { base, extensions })
    }

    /// Checks server, database and URL settings. The API key is checked by [`Self::validate_for_llm`].
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        self.extensions.validate()
    }

    /// [`Self::validate`] plus everything needed to call the LLM (API key, timeout).
    pub fn validate_for_llm(&self) -> Result<()> {
        self.validate()?;
        self.extensions.llm.validate()
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }
    pub fn extensions(&self) -> &AppExtensions {
        &self.extensions
    }

    pub fn database_url(&self) -> &str {
        &self.base.database_url
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn openai_model(&self) -> &str {
        self.extensions.llm.model()
    }
    pub fn auto_index(&self) -> bool {
        self.extensions.graphrag.auto_index
    }
}

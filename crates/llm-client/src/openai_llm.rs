//! OpenAI implementation of [`LlmClient`]: wraps openai-client with fixed sampling presets.

use anyhow::Result;
use async_trait::async_trait;
use openai_client::{CompletionOptions, StreamChunk as OpenAIStreamChunk, ToolSpec};
use prompt::ChatMessage;
use tracing::instrument;

use super::{
    to_openai_messages, LlmClient, LlmConfig, ModelInfo, StreamChunk, StreamChunkCallback,
    ToolCall, ToolChatResponse, ToolDefinition, Usage,
};
use crate::config::DEFAULT_MODEL;

/// [`LlmClient`] backed by an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAILlmClient {
    client: openai_client::OpenAIClient,
    model: String,
    base_url: Option<String>,
}

impl OpenAILlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: openai_client::OpenAIClient::new(api_key),
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: openai_client::OpenAIClient::with_base_url(api_key, base_url.clone()),
            model: DEFAULT_MODEL.to_string(),
            base_url: Some(base_url),
        }
    }

    /// Builds a client from config: key, optional base URL, model and timeout.
    pub fn from_config(config: &dyn LlmConfig) -> Result<Self> {
        let client = match config.base_url() {
            Some(url) => Self::with_base_url(config.api_key().to_string(), url.to_string()),
            None => Self::new(config.api_key().to_string()),
        };
        client
            .with_model(config.model().to_string())
            .with_timeout(config.timeout())
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Result<Self> {
        self.client = self.client.with_timeout(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl LlmClient for OpenAILlmClient {
    #[instrument(skip(self, messages), fields(model = %self.model))]
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let openai_messages = to_openai_messages(&messages)?;
        self.client
            .chat_completion(&self.model, openai_messages, CompletionOptions::GENERATION)
            .await
    }

    #[instrument(skip(self, messages, callback), fields(model = %self.model))]
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        callback: &mut StreamChunkCallback,
    ) -> Result<String> {
        let openai_messages = to_openai_messages(&messages)?;
        self.client
            .chat_completion_stream(
                &self.model,
                openai_messages,
                CompletionOptions::GENERATION,
                |chunk: OpenAIStreamChunk| {
                    callback(StreamChunk {
                        content: chunk.content,
                        done: chunk.done,
                    })
                },
            )
            .await
    }

    #[instrument(skip(self, messages, tools), fields(model = %self.model))]
    async fn chat_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> Result<ToolChatResponse> {
        let openai_messages = to_openai_messages(&messages)?;
        let specs: Vec<ToolSpec> = tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect();
        let completion = self
            .client
            .chat_completion_with_tools(
                &self.model,
                openai_messages,
                &specs,
                CompletionOptions::TOOL_CALLING,
            )
            .await?;
        Ok(ToolChatResponse {
            content: completion.content,
            tool_call: completion.tool_call.map(|c| ToolCall {
                name: c.name,
                arguments: c.arguments,
            }),
            usage: completion.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn health_check(&self) -> bool {
        self.client.health_check(&self.model).await
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

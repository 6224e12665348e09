//! # OpenAI API client
//!
//! Thin wrapper around [async-openai] for chat completion (non-stream and stream),
//! single-tool function calling and a one-token health check.
//! Provides token masking for safe logging and a simple request/response API.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FunctionObjectArgs,
    },
    Client,
};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Masks an API key/token for safe logging: shows first 7 chars + "***" + last 4 chars.
/// If length <= 11, returns "***" to avoid leaking any part of the key.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();
    if len <= 11 {
        "***".to_string()
    } else {
        let head: String = chars[..7].iter().collect();
        let tail: String = chars[len - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

/// Sampling parameters for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionOptions {
    /// Answer generation.
    pub const GENERATION: CompletionOptions = CompletionOptions {
        temperature: 0.7,
        max_tokens: 4000,
    };

    /// Tool-calling (routing) requests.
    pub const TOOL_CALLING: CompletionOptions = CompletionOptions {
        temperature: 0.3,
        max_tokens: 2000,
    };
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::GENERATION
    }
}

/// A function the model may call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// First tool call returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallOutput {
    pub name: String,
    /// Raw JSON arguments string as sent by the model.
    pub arguments: String,
}

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a tool-calling completion.
#[derive(Debug, Clone, Default)]
pub struct ToolCompletion {
    pub content: Option<String>,
    pub tool_call: Option<ToolCallOutput>,
    pub usage: Option<TokenUsage>,
}

/// A chunk of streamed completion content and whether the stream is finished.
pub struct StreamChunk {
    /// Text delta received since the previous callback.
    pub content: String,
    /// True if this is the final chunk for the response.
    pub done: bool,
}

/// OpenAI chat client. Wraps async-openai client; optionally holds API key for masked logging.
#[derive(Clone)]
pub struct OpenAIClient {
    /// Shared async-openai client used for all API calls.
    client: Arc<Client<OpenAIConfig>>,
    config: OpenAIConfig,
    /// API key stored only for logging (masked). None when created via `with_client()`.
    api_key_for_logging: Option<String>,
}

impl OpenAIClient {
    /// Builds a client using the given API key and default API base URL.
    pub fn new(api_key: String) -> Self {
        let api_key_for_logging = Some(api_key.clone());
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Arc::new(Client::with_config(config.clone())),
            config,
            api_key_for_logging,
        }
    }

    /// Builds a client with a custom base URL (e.g. for proxies or compatible endpoints).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let api_key_for_logging = Some(api_key.clone());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Arc::new(Client::with_config(config.clone())),
            config,
            api_key_for_logging,
        }
    }

    /// Builds a client from an existing async-openai client (no API key stored for logging).
    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self {
            config: client.config().clone(),
            client: Arc::new(client),
            api_key_for_logging: None,
        }
    }

    /// Rebuilds the HTTP transport with a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        self.client =
            Arc::new(Client::with_config(self.config.clone()).with_http_client(http_client));
        Ok(self)
    }

    fn masked_key(&self) -> String {
        self.api_key_for_logging
            .as_deref()
            .map(mask_token)
            .unwrap_or_else(|| "***".to_string())
    }

    #[allow(deprecated)]
    fn build_request(
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        options: CompletionOptions,
        tools: Option<Vec<ChatCompletionTool>>,
    ) -> anyhow::Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model)
            .messages(messages)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens);
        if let Some(tools) = tools {
            args.tools(tools)
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }
        Ok(args.build()?)
    }

    /// Sends a chat completion request and returns the full assistant reply as a string.
    ///
    /// Logs masked API key and token usage. Returns the first choice's content
    /// or an error if the response has no choices.
    pub async fn chat_completion(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        options: CompletionOptions,
    ) -> anyhow::Result<String> {
        tracing::info!(
            model = %model,
            message_count = messages.len(),
            temperature = options.temperature,
            max_tokens = options.max_tokens,
            api_key = %self.masked_key(),
            "OpenAI chat_completion request"
        );

        let request = Self::build_request(model, messages, options, None)?;
        if let Ok(json) = serde_json::to_string(&request) {
            tracing::debug!(request_json = %json, "OpenAI chat_completion request JSON");
        }

        let response = self.client.chat().create(request).await?;

        if let Some(ref u) = response.usage {
            tracing::info!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                "OpenAI chat_completion usage"
            );
        }

        match response.choices.first() {
            Some(choice) => Ok(choice.message.content.clone().unwrap_or_default()),
            None => anyhow::bail!("No response from OpenAI"),
        }
    }

    /// Streams chat completion and invokes `callback` for every content delta.
    /// Returns the full concatenated response text. Stream errors are propagated.
    pub async fn chat_completion_stream<F, Fut>(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        options: CompletionOptions,
        mut callback: F,
    ) -> anyhow::Result<String>
    where
        F: FnMut(StreamChunk) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<()>>,
    {
        tracing::info!(
            model = %model,
            message_count = messages.len(),
            api_key = %self.masked_key(),
            "OpenAI chat_completion_stream request"
        );

        let request = Self::build_request(model, messages, options, None)?;
        let mut stream = self.client.chat().create_stream(request).await?;

        let mut full_response = String::new();
        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| anyhow::anyhow!("Stream error: {}", e))?;
            if let Some(ref u) = chunk.usage {
                tracing::info!(
                    prompt_tokens = u.prompt_tokens,
                    completion_tokens = u.completion_tokens,
                    total_tokens = u.total_tokens,
                    "OpenAI chat_completion_stream usage"
                );
            }
            let Some(choice) = chunk.choices.first() else {
                continue;
            };
            let done = choice.finish_reason.is_some();
            match &choice.delta.content {
                Some(content) if !content.is_empty() => {
                    full_response.push_str(content);
                    callback(StreamChunk {
                        content: content.clone(),
                        done,
                    })
                    .await?;
                }
                _ if done => {
                    callback(StreamChunk {
                        content: String::new(),
                        done,
                    })
                    .await?;
                }
                _ => {}
            }
        }

        tracing::info!(
            response_chars = full_response.chars().count(),
            "OpenAI chat_completion_stream finished"
        );
        Ok(full_response)
    }

    /// Sends a completion with `tools` and `tool_choice=auto`.
    /// Returns the reply content, the first tool call (if any) and token usage.
    pub async fn chat_completion_with_tools(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: &[ToolSpec],
        options: CompletionOptions,
    ) -> anyhow::Result<ToolCompletion> {
        tracing::info!(
            model = %model,
            message_count = messages.len(),
            tool_count = tools.len(),
            api_key = %self.masked_key(),
            "OpenAI chat_completion_with_tools request"
        );

        let mut openai_tools = Vec::with_capacity(tools.len());
        for tool in tools {
            let function = FunctionObjectArgs::default()
                .name(tool.name.clone())
                .description(tool.description.clone())
                .parameters(tool.parameters.clone())
                .build()?;
            openai_tools.push(
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()?,
            );
        }

        let request = Self::build_request(model, messages, options, Some(openai_tools))?;
        let response = self.client.chat().create(request).await?;

        let usage = response.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let Some(choice) = response.choices.first() else {
            anyhow::bail!("No response from OpenAI");
        };

        let tool_call = choice
            .message
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .map(|call| ToolCallOutput {
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            });

        tracing::info!(
            tool_called = tool_call.as_ref().map(|c| c.name.as_str()).unwrap_or("none"),
            total_tokens = usage.map(|u| u.total_tokens).unwrap_or(0),
            "OpenAI chat_completion_with_tools response"
        );

        Ok(ToolCompletion {
            content: choice.message.content.clone(),
            tool_call,
            usage,
        })
    }

    /// Sends a one-token request; false on any error.
    pub async fn health_check(&self, model: &str) -> bool {
        let result = async {
            let message: ChatCompletionRequestMessage =
                ChatCompletionRequestUserMessageArgs::default()
                    .content("test")
                    .build()?
                    .into();
            let request = Self::build_request(
                model,
                vec![message],
                CompletionOptions {
                    temperature: 0.0,
                    max_tokens: 1,
                },
                None,
            )?;
            self.client.chat().create(request).await?;
            anyhow::Ok(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "OpenAI health check failed");
                false
            }
        }
    }
}

//! Text generation for outlines and host scripts.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

use crate::error::PodcastError;

/// A single-turn chat completion backend.
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    /// Complete `prompt` under `system`, returning the generated text.
    ///
    /// `step` names the request in logs and errors ("outline", a host name).
    async fn complete(
        &self,
        step: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, PodcastError>;
}

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
    /// Chat model name.
    pub model: String,
}

impl WriterConfig {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// [`ScriptWriter`] backed by `async-openai`.
pub struct OpenAiWriter {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAiWriter {
    pub fn new(config: WriterConfig) -> Result<Self, PodcastError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PodcastError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model,
            max_retries: 3,
        })
    }
}

#[async_trait]
impl ScriptWriter for OpenAiWriter {
    async fn complete(
        &self,
        step: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, PodcastError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: prompt.to_string().into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(max_tokens)
            .messages(messages)
            .build()?;

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Retrying {} ({}/{}) in {:?}",
                    step,
                    attempt + 1,
                    self.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            tracing::debug!("Requesting {} from {}", step, self.model);
            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    if !content.trim().is_empty() {
                        return Ok(content);
                    }
                    last_error = Some(PodcastError::EmptyGeneration {
                        step: step.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Generation of {} failed: {}", step, e);
                    last_error = Some(PodcastError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PodcastError::EmptyGeneration {
            step: step.to_string(),
        }))
    }
}

/// Wait before retry number `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(6))
}

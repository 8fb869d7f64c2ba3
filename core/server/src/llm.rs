use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use study_desk_engine::{normalize_as, with_json_instruction, NormalizeError};
use study_desk_schemas::Message;
use thiserror::Error;
use tracing::debug;

/// Sampling temperature used unless a call site asks for something else.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Configuration for the chat-completion backend
#[derive(Debug, Clone, PartialEq)]
pub struct LLMConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            api_key: None,
            model: "qwen2.5-7b-instruct-1m".to_string(),
            timeout_secs: 60,
        }
    }
}

impl LLMConfig {
    /// Read `LLM_*` settings through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_secs = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("LLM_TIMEOUT_SECS is not a number: {:?}", raw))?,
            None => defaults.timeout_secs,
        };

        Ok(Self {
            base_url: lookup("LLM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: lookup("LLM_API_KEY").filter(|key| !key.is_empty()),
            model: lookup("LLM_MODEL").unwrap_or(defaults.model),
            timeout_secs,
        })
    }
}

/// A remote chat-completion service.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send `messages` and return the raw text of the first choice.
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAICompatibleClient {
    config: LLMConfig,
    client: Client,
}

impl OpenAICompatibleClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatCompletion for OpenAICompatibleClient {
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let request_body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
        });

        debug!("Calling chat completion at {} ({} messages)", url, messages.len());

        let mut request = self.client.post(&url).json(&request_body);

        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to call chat completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completion API error {}: {}", status, error_text);
        }

        #[derive(Deserialize)]
        struct CompletionResponse {
            choices: Vec<CompletionChoice>,
        }

        #[derive(Deserialize)]
        struct CompletionChoice {
            message: CompletionMessage,
        }

        #[derive(Deserialize)]
        struct CompletionMessage {
            content: Option<String>,
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No choices in chat completion response"))
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("language model request failed: {0:#}")]
    Upstream(anyhow::Error),
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
}

/// Ask for a JSON reply and decode it into the shape `T`.
pub async fn complete_json<T: DeserializeOwned>(
    llm: &dyn ChatCompletion,
    messages: Vec<Message>,
    temperature: f32,
) -> std::result::Result<T, CompletionError> {
    let messages = with_json_instruction(messages);
    let text = llm
        .complete(&messages, temperature)
        .await
        .map_err(CompletionError::Upstream)?;

    Ok(normalize_as(&text)?)
}

//! OpenRouter chat-completions client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ClientFactory, Completion, CompletionClient, CompletionRequest, LlmError, TokenUsage};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const REFERER: &str = "https://github.com/agent-conductor";
const TITLE: &str = "Agent Conductor";

/// Client for the OpenRouter `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// A factory producing clients that share one connection pool.
    pub fn factory(base_url: impl Into<String>) -> ClientFactory {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::new();
        Arc::new(move |api_key: &str| {
            Arc::new(OpenRouterClient {
                api_key: api_key.to_string(),
                base_url: base_url.clone(),
                client: client.clone(),
            }) as Arc<dyn CompletionClient>
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "sending completion request");

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let body = if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            };
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no message content".to_string()))?;

        Ok(Completion {
            content,
            usage: parsed.usage,
        })
    }
}

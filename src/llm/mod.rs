//! Completion client module for talking to text-completion providers.
//!
//! A [`CompletionClient`] performs exactly one request/response exchange.
//! It never retries; retry policy belongs to the caller.

mod error;
mod openrouter;

pub use error::LlmError;
pub use openrouter::{OpenRouterClient, DEFAULT_BASE_URL};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single non-streaming completion request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

/// Full response text plus usage.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

/// Trait for completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one completion request and await the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

/// Builds a client from the credential carried by an `initialize` message.
pub type ClientFactory = Arc<dyn Fn(&str) -> Arc<dyn CompletionClient> + Send + Sync>;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors that can occur in the agent system
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM API error: {0}")]
    Llm(#[from] LlmError),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task type {actual} is not handled by a {expected} worker")]
    UnsupportedTask { expected: String, actual: String },

    #[error("Worker is not initialized")]
    NotInitialized,

    #[error("Worker is busy with task {0}")]
    WorkerBusy(String),

    #[error("No completion client configured (missing API key)")]
    NoCompletionClient,

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Message delivery failed: {0}")]
    MessageDeliveryFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

use thiserror::Error;

/// Failures surfaced by a completion client
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// HTTP status of a non-success response, if that is what failed
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

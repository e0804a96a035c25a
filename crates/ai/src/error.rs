use thiserror::Error;

/// Failure of a single inference attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    /// The job input could not be turned into a prompt. Retrying cannot help.
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    /// Connection refused, timeout, broken body...
    #[error("inference transport error: {0}")]
    Transport(String),

    /// The generation service answered with a non-2xx status.
    #[error("inference service error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The generation envelope or the model answer was not JSON.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl AiError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AiError::InvalidInput(_))
    }
}

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Failures a single turn can end in. None of these leave partially applied
/// conversation state behind, so retrying the same logical turn is always
/// safe.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to reach backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend rejected the request with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("event stream interrupted: {0}")]
    Stream(#[from] std::io::Error),

    #[error("malformed backend response: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Stable identifier for the error kind, used in structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(_) | ClientError::Status { .. } | ClientError::Stream(_) => {
                "transport_error"
            }
            ClientError::Protocol(_) => "protocol_error",
        }
    }
}

use std::fmt;

/// Which step of the readiness handshake failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStage {
    Server,
    Model,
}

impl fmt::Display for ReadinessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessStage::Server => f.write_str("server"),
            ReadinessStage::Model => f.write_str("model"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferError {
    /// The endpoint or the model is not ready to serve.
    #[error("{stage} not ready for model `{model}`: {reason}")]
    ServiceUnavailable {
        model: String,
        stage: ReadinessStage,
        reason: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    /// The response did not match what the model declares.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl InferError {
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, InferError::ServiceUnavailable { .. })
    }
}

impl From<reqwest::Error> for InferError {
    fn from(err: reqwest::Error) -> Self {
        InferError::Transport(err.to_string())
    }
}

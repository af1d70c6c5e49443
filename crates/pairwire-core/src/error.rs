use thiserror::Error;

/// Errors produced by the pairwire protocol and host layers.
#[derive(Debug, Error)]
pub enum PairwireError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type PairwireResult<T> = Result<T, PairwireError>;

use thiserror::Error;

pub type AppResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Infra(#[from] InfraError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Validation failures on inbound wire frames. These never tear down the
/// process; the connection handler logs them and moves on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{kind} envelope is missing required field: {field}")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("unknown command action: {0}")]
    UnknownAction(String),

    #[error("inbound frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to read config file: {0}")]
    ConfigRead(std::io::Error),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(String, String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

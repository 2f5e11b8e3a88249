use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{service} did not send its signatures within {timeout:?}")]
    Timeout { service: String, timeout: Duration },
    #[error("call to {function} timed out after {timeout:?}")]
    CallTimeout { function: String, timeout: Duration },
    #[error("{service} has no function named {function}")]
    UnknownFunction { service: String, function: String },
    #[error("bad arguments for {function}: {reason}")]
    BadArguments { function: String, reason: String },
    #[error("remote error: {0}")]
    Remote(String),
    #[error("failed to decode packet: {0}")]
    Decode(String),
    #[error("no encoder named {0}")]
    MissingEncoder(String),
    #[error("no encoder accepts a {0} value")]
    Unencodable(&'static str),
    #[error("channel disconnected")]
    Disconnected,
    #[error("failed to start worker: {0}")]
    Spawn(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    pub fn bad_arguments(function: &str, reason: impl Into<String>) -> Self {
        RpcError::BadArguments {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

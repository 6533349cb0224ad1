use thiserror::Error;

/// Failures talking to the Jarvis backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend URL {0}")]
    InvalidUrl(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a response is still streaming")]
    ExchangeInProgress,

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(String);

impl ClipboardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {value:?}")]
    InvalidDuration { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

use thiserror::Error;

/// Failures talking to the Deita API.
///
/// Kept `Clone` so a failure can be both recorded in an operation status and
/// handed to the caller as a notification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Server returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("Could not decode response: {0}")]
    Decode(String),
    #[error("Count response did not contain a single non-negative integer")]
    MalformedCount,
}

impl BackendError {
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        BackendError::Status {
            status,
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmError {
    #[error("no credential source is available: {0}")]
    CredentialUnavailable(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("request to resource manager failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("resource manager returned HTTP {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },
    #[error("operation ended as {status} ({code}): {message}")]
    OperationFailed {
        status: String,
        code: String,
        message: String,
    },
    #[error("operation did not reach a terminal state within {0:?}")]
    Timeout(Duration),
    #[error("unexpected response from resource manager: {0}")]
    InvalidResponse(String),
}

impl ArmError {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } | Self::OperationFailed { code, .. } => Some(code),
            _ => None,
        }
    }
}

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolcanoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid input: {reason}")]
    EmptyInput { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Endpoint not found: {message}")]
    EndpointNotFound { message: String },

    #[error("Processing failed: {message}")]
    ProcessingFailed { message: String },

    #[error("Text split failed: {reason}")]
    SplitFailed { reason: String },

    #[error("Image encoding error: {reason}")]
    ImageEncoding { reason: String },

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl VolcanoError {
    /// Maps a non-success HTTP status to its failure class.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), body.trim())
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                VolcanoError::Authentication { message }
            }
            StatusCode::NOT_FOUND => VolcanoError::EndpointNotFound { message },
            _ => VolcanoError::ProcessingFailed { message },
        }
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        VolcanoError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for VolcanoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            return VolcanoError::Connection {
                message: err.to_string(),
            };
        }

        match err.status() {
            Some(status) => VolcanoError::from_status(status, &err.to_string()),
            None => VolcanoError::ProcessingFailed {
                message: err.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, VolcanoError>;

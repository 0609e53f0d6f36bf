use thiserror::Error;

#[derive(Debug, Error)]
/// Failure kinds surfaced by [`crate::IssueTracker`] implementations.
pub enum TrackerError {
    #[error("issue tracker has no {resource} '{key}'")]
    NotFound { resource: &'static str, key: String },
    #[error("issue tracker {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("issue tracker {operation} request failed: {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode issue tracker {operation}: {message}")]
    Decode { operation: String, message: String },
    #[error("invalid issue tracker request: {0}")]
    InvalidRequest(String),
}

impl TrackerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    pub(crate) fn decode(operation: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

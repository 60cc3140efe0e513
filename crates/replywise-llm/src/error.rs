//! Error taxonomy for the request pipeline.
//!
//! All pipeline operations return [`Result<T>`] which uses [`LlmError`] as
//! the error type. [`LlmError::user_message`] turns any error into the
//! single string shown to the user.

use thiserror::Error;

/// Shown when a provider needs a credential and none is stored.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "Please set your API key in the extension options.";

/// Errors that can occur while resolving, sending or decoding a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The provider's auth scheme needs a credential and none is stored.
    #[error("missing credential")]
    MissingCredential,

    /// The custom base URL is not a usable absolute http(s) URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A single attempt exceeded its deadline.
    #[error("timeout")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// No HTTP response at all (DNS, connect, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The body was not JSON or lacked the expected text field.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The provider returned a JSON `error` envelope.
    #[error("{0}")]
    ProviderReported(String),

    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

impl LlmError {
    /// The user-facing classification of this error.
    ///
    /// Classified HTTP statuses never leak the provider's raw text; provider
    /// envelopes and unknown errors are passed through.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
            LlmError::Timeout => "Request timed out".to_string(),
            LlmError::HttpStatus { status } => match status {
                400 => "Bad request: check the model name or request body".to_string(),
                401 => "Unauthorized: invalid API key".to_string(),
                402 => "Payment required: quota exceeded".to_string(),
                403 => "Forbidden: access denied".to_string(),
                404 => "Endpoint not found".to_string(),
                408 => "Upstream timeout".to_string(),
                429 => "Rate limited: too many requests".to_string(),
                500..=599 => "Upstream server error".to_string(),
                other => format!("Unknown error: HTTP {other}"),
            },
            LlmError::Network(_) => "Cannot reach server".to_string(),
            LlmError::UnexpectedResponse(_) => "Unexpected API response".to_string(),
            LlmError::ProviderReported(msg) => msg.clone(),
            LlmError::InvalidEndpoint(msg) | LlmError::Unknown(msg) => {
                format!("Unknown error: {msg}")
            }
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if let Some(status) = err.status() {
            LlmError::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::UnexpectedResponse(err.to_string())
    }
}

/// A convenience type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, LlmError>;

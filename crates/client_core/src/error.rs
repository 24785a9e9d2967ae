use shared::error::{ApiException, ErrorCode};
use thiserror::Error;

/// Failure of a leads API call or controller operation.
///
/// `Clone` so that coalesced callers can all receive the same outcome.
#[derive(Debug, Clone, Error)]
pub enum LeadsError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("endpoint not available: {endpoint}")]
    NotAvailable { endpoint: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("no leads selected for calling")]
    NothingSelected,
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl LeadsError {
    /// Whether the failure should reach the user as a notification.
    /// Missing endpoints are only logged.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, LeadsError::NotAvailable { .. })
    }

    pub fn is_server_fault(&self) -> bool {
        matches!(self, LeadsError::Server { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for LeadsError {
    fn from(value: reqwest::Error) -> Self {
        LeadsError::Network(value.to_string())
    }
}

impl LeadsError {
    /// Maps a non-2xx response for `endpoint`.
    pub fn from_response(endpoint: &str, exception: ApiException) -> Self {
        match exception.code {
            ErrorCode::NotFound => LeadsError::NotAvailable {
                endpoint: endpoint.to_string(),
            },
            _ => LeadsError::Server {
                status: exception.status,
                message: exception.message,
            },
        }
    }
}

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("{0} request timed out after {1:?}")]
    Timeout(String, Duration),
}

impl EnrichError {
    /// Whether a retry could plausibly succeed. Transport failures and
    /// server-side errors qualify; a well-formed empty or malformed payload
    /// never does.
    pub fn is_transient(&self) -> bool {
        match self {
            EnrichError::NetworkRequest(_, _) | EnrichError::Timeout(_, _) => true,
            EnrichError::HttpStatus { status, .. } => status.is_server_error(),
            EnrichError::MalformedResponse { .. } => false,
        }
    }
}

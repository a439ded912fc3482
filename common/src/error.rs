use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Provider answered HTTP 429.
    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Bad server response: HTTP {0}")]
    BadServerResponse(u16),

    /// Timeouts, refused or dropped connections, no connectivity.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("No market data available")]
    NoDataAvailable,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Error {
    /// Only transport-level failures are worth another attempt against the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientNetwork(_))
    }

    /// Maps an HTTP status to the error a provider call should fail with.
    pub fn from_status(provider: &str, status: u16) -> Self {
        if status == 429 {
            Error::RateLimited(provider.to_string())
        } else {
            Error::BadServerResponse(status)
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Error::ConfigError(err.to_string());
        }
        if err.is_decode() {
            return Error::DecodeError(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                let host = err
                    .url()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| "provider".to_string());
                return Error::RateLimited(host);
            }
            if err.is_status() {
                return Error::BadServerResponse(status.as_u16());
            }
        }
        // timeouts, connect failures, body read failures and redirects all land here
        Error::TransientNetwork(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::DecodeError(err.to_string())
    }
}

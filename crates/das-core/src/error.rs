//! Error types for das-core.

use thiserror::Error;

/// das-core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The DAS endpoint answered with a JSON-RPC error object
    #[error("DAS RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Every candidate answered 429
    #[error("rate limited by every gateway for {0}")]
    RateLimited(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sample asset gave no way to list the collection
    #[error("no collection, authority or creator could be determined from the sample asset")]
    NoStrategy,

    /// URL could not be parsed or built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited(_) => true,
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for das-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            url: "https://example.com".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn not_found_is_final() {
        let err = Error::Status {
            status: 404,
            url: "https://example.com".into(),
        };
        assert!(!err.is_transient());
        assert!(!Error::NoStrategy.is_transient());
        assert!(!Error::Rpc {
            code: -32602,
            message: "bad params".into()
        }
        .is_transient());
    }
}

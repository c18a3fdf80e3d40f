use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error(transparent)]
    Core(#[from] citeweave_core::CiteweaveError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    /// The source answered with something we could not parse. The raw
    /// body is kept for the operator.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse {
        url: String,
        reason: String,
        payload: String,
    },

    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),

    #[error("record without external id: {0}")]
    MissingId(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScienceError>;

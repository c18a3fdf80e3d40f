use thiserror::Error;

/// All errors that can occur in citeweave-core.
#[derive(Debug, Error)]
pub enum CiteweaveError {
    #[error("Publication not found: {0}")]
    PublicationNotFound(i64),

    #[error("Pending record not found: {0}")]
    PendingNotFound(i64),

    #[error("Author not found: {0}")]
    AuthorNotFound(i64),

    /// An id was about to be claimed by both a Publication and a PendingRecord.
    #[error("Duplicate id {0}: already stored as a publication")]
    DuplicateId(i64),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    MalformedResponse = 4,
    NetworkError = 6,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, CiteweaveError>;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid value: {0}")]
    Types(#[from] drive_types::TypesError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("backend returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("failed to decode backend response: {0}")]
    Decode(serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("external surface error: {0}")]
    Surface(String),
}

pub type DriveResult<T> = std::result::Result<T, DriveError>;

use thiserror::Error;

/// Errors raised inside the lottery library.
///
/// The acquisition pipeline absorbs all of these; they only escape through
/// the lower-level collaborators (HTTP client, store, date helpers).
#[derive(Error, Debug)]
pub enum XsmbError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid response format: no JSON found")]
    NoJsonFound,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("No lottery data for {0}")]
    NoData(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, XsmbError>;

use thiserror::Error;

use crate::retry::{is_transient_sqlite_error, RetryClass};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("News article {0} not found")]
    ArticleNotFound(uuid::Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// How the retry policy should treat this error
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Error::UpstreamStatus { status: 429, .. } => RetryClass::RateLimited,
            Error::UpstreamStatus { status, .. } if (500..=599).contains(status) => {
                RetryClass::ServerError
            }
            Error::Database(err) if is_transient_sqlite_error(err) => RetryClass::Transient,
            _ => RetryClass::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

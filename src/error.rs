//! Custom error types for prospector

use thiserror::Error;

/// Main error type for prospector operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Directory API error: {0}")]
    Directory(String),

    #[error("Email delivery error: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Lead has no email address: {0}")]
    NoEmail(String),

    #[error("Recipient is unsubscribed: {0}")]
    Suppressed(String),

    #[error("Daily sending limit of {0} emails reached")]
    QuotaExhausted(i64),

    #[error("Not initialized: run 'prospector init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for prospector
pub type Result<T> = std::result::Result<T, Error>;

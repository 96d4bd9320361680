use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Query to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("Could not connect to {url} after {attempts} attempt(s): {message}")]
    Connection {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Service at {url} answered HTTP {status}: {snippet}")]
    HttpStatus {
        url: String,
        status: u16,
        snippet: String,
    },

    #[error("VOTABLE error: {0}")]
    Votable(String),

    #[error("Name resolution failed: {0}")]
    Resolver(String),
}

impl VoError {
    pub fn invalid(message: impl Into<String>) -> Self {
        VoError::InvalidInput(message.into())
    }

    pub fn votable(message: impl Into<String>) -> Self {
        VoError::Votable(message.into())
    }
}

pub type Result<T> = std::result::Result<T, VoError>;

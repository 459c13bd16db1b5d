use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{SiteAuthentication, SiteId};
use crate::fetcher::TransportError;
use crate::loader::LoaderError;
use crate::site::ParseError;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Site not found: {0}")]
    SiteNotFound(SiteId),

    #[error("Board not found: /{0}/")]
    BoardNotFound(String),

    #[error("Not supported by this site: {0}")]
    UnsupportedFeature(String),

    #[error("Loader is no longer running")]
    LoaderClosed,

    #[error("Load failed: {0}")]
    Loader(#[from] LoaderError),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(SiteAuthentication),

    #[error("Rejected by site: {message}")]
    Validation {
        message: String,
        probably_banned: bool,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<ConfigError> for WatchError {
    fn from(e: ConfigError) -> Self {
        WatchError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;

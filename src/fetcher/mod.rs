pub mod http_fetcher;
pub mod parallel;
pub mod request;

use async_trait::async_trait;
use thiserror::Error;

pub use http_fetcher::HttpFetcher;
pub use parallel::ParallelTransport;
pub use request::{FormBuilder, FormValue, Method, RequestBody, RequestSpec};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Failure to complete an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status(404))
    }
}

impl From<url::ParseError> for TransportError {
    fn from(e: url::ParseError) -> Self {
        TransportError::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Executes requests built by site adapters.
///
/// Dropping the returned future cancels the in-flight call.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: RequestSpec) -> Result<HttpResponse, TransportError>;
}

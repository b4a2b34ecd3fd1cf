//! Error types for routing and dispatch.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// A boxed error that can cross task boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised while configuring a router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A route was registered without any handler.
    #[error("route {method} {pattern} has no handlers")]
    EmptyChain { method: String, pattern: String },

    /// Invalid path pattern.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for router configuration.
pub type Result<T> = std::result::Result<T, RouterError>;

/// A failure surfaced while serving a request.
///
/// Every variant maps to an HTTP status through [`HttpError::status`]. The
/// display text is what a client sees in production mode for statuses below
/// 500; [`HttpError::diagnostic`] carries the full detail.
#[derive(Debug, Error)]
pub enum HttpError {
    /// No route matched the request.
    #[error("Not Found")]
    NotFound { method: String, path: String },

    /// The request body exceeded the configured limit.
    #[error("Payload Too Large")]
    PayloadTooLarge { limit: usize },

    /// The body was declared as JSON but did not parse.
    #[error("Invalid JSON")]
    InvalidJson(#[source] serde_json::Error),

    /// A failure signaled by a middleware or handler.
    #[error("{message}")]
    Handler {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A second terminal write was attempted on the same response.
    #[error("response already sent")]
    AlreadySent,

    /// A response payload could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialization(#[source] serde_json::Error),

    /// I/O failure while producing a response.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Unexpected failure in dispatch bookkeeping.
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    /// Creates a handler error carrying an explicit status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self::Handler {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error without a status; it is reported as 500.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Handler {
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error raised inside a handler.
    pub fn wrap<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Handler {
            status: None,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::PayloadTooLarge { .. } => 413,
            Self::InvalidJson(_) => 400,
            Self::Handler { status, .. } => status.unwrap_or(500),
            Self::Io(err) if err.kind() == io::ErrorKind::NotFound => 404,
            Self::AlreadySent | Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the full diagnostic text, including the chain of sources.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let mut out = match self {
            Self::NotFound { method, path } => format!("{self}: no route matched {method} {path}"),
            Self::PayloadTooLarge { limit } => format!("{self}: body exceeds {limit} bytes"),
            _ => self.to_string(),
        };

        let mut source = self.source();
        while let Some(err) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }

        out
    }
}

//! Unified error type.

use std::time::Duration;

use http::StatusCode;

/// A boxed, thread-safe error raised by user middleware or handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by kasane's fallible operations.
///
/// Application-level outcomes (404, 422, etc.) are normally written into the
/// response as values. `Error` is what travels up the middleware chain when
/// a unit or handler *fails*: every outer unit sees it at its `next` call
/// site and may turn it back into a response (see
/// [`Recover`](crate::middleware::Recover)).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid setup detected before serving: a pipeline without a terminal
    /// handler, a malformed route pattern, a bad config value.
    #[error("configuration: {0}")]
    Configuration(String),

    /// A middleware unit ran its continuation more than once for a single
    /// request.
    #[error("middleware `{unit}` (index {index}) called next more than once")]
    ProtocolViolation { unit: &'static str, index: usize },

    /// A failure that already knows which HTTP status it maps to.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Downstream did not finish within its budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An opaque failure raised by a middleware unit or handler.
    #[error("middleware: {0}")]
    Middleware(#[source] BoxError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps any error raised by user code.
    pub fn middleware(err: impl Into<BoxError>) -> Self {
        Self::Middleware(err.into())
    }

    /// A failure carrying its own HTTP status.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The HTTP status a response for this error should carry.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

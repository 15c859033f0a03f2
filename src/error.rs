//! Error types for cloff.
//!
//! Startup failures (configuration, credentials) surface as [`Error::Config`] and
//! [`Error::Authentication`] and abort the process.  Everything else is scoped to a
//! single turn: the session reports it inline and keeps the conversation consistent.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for cloff.
#[derive(Clone, Debug)]
pub enum Error {
    /// A generic API error occurred.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Status string from the API, e.g. `INVALID_ARGUMENT`.
        status: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// Authentication error, including a missing API key.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization/Permission error.
    Permission {
        /// Human-readable error message.
        message: String,
    },

    /// The model or endpoint was not found.
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Rate limit exceeded.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Bad request due to invalid parameters.
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// No fragment arrived within the idle timeout.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The user interrupted the turn.
    Interrupted,

    /// The model finished without producing any text.
    EmptyReply,

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Server returned a 500 internal error.
    InternalServer {
        /// Human-readable error message.
        message: String,
    },

    /// Server is overloaded or unavailable.
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The configuration is missing, malformed, or incomplete.
    Config {
        /// Human-readable error message.
        message: String,
        /// The field that failed, if known.
        field: Option<String>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// A streaming error occurred.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, status: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            status,
            message: message.into(),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>, field: Option<String>) -> Self {
        Error::Config {
            message: message.into(),
            field,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if the user interrupted the turn.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }

    /// Returns true if this error is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// Returns true if the underlying cause is a missing file.
    pub fn is_not_found_io(&self) -> bool {
        matches!(self, Error::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns true if retrying the same turn could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 409 | 429 | 500..=599)
            }
            Error::Timeout { .. } => true,
            Error::Connection { .. } => true,
            Error::RateLimit { .. } => true,
            Error::ServiceUnavailable { .. } => true,
            Error::InternalServer { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                status,
                message,
            } => {
                if let Some(status) = status {
                    write!(f, "{status} ({status_code}): {message}")
                } else {
                    write!(f, "API error ({status_code}): {message}")
                }
            }
            Error::Authentication { message } => {
                write!(f, "Authentication error: {message}")
            }
            Error::Permission { message } => {
                write!(f, "Permission error: {message}")
            }
            Error::NotFound { message } => {
                write!(f, "Not found: {message}")
            }
            Error::RateLimit {
                message,
                retry_after,
            } => {
                if let Some(retry_after) = retry_after {
                    write!(
                        f,
                        "Rate limit exceeded: {message} (retry after {retry_after} seconds)"
                    )
                } else {
                    write!(f, "Rate limit exceeded: {message}")
                }
            }
            Error::BadRequest { message } => {
                write!(f, "Bad request: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Interrupted => {
                write!(f, "Interrupted")
            }
            Error::EmptyReply => {
                write!(f, "The model returned an empty reply")
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::InternalServer { message } => {
                write!(f, "Internal server error: {message}")
            }
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => {
                if let Some(retry_after) = retry_after {
                    write!(
                        f,
                        "Service unavailable: {message} (retry after {retry_after} seconds)"
                    )
                } else {
                    write!(f, "Service unavailable: {message}")
                }
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error: {message} (field: {field})")
                } else {
                    write!(f, "Configuration error: {message}")
                }
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for cloff operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_names_field() {
        let err = Error::config("missing required field", Some("showstats".to_string()));
        assert_eq!(
            err.to_string(),
            "Configuration error: missing required field (field: showstats)"
        );
        assert!(err.is_config());
    }

    #[test]
    fn io_not_found_is_detected() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_not_found_io());
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!err.is_not_found_io());
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::api(503, None, "busy").is_retryable());
        assert!(!Error::api(400, None, "bad").is_retryable());
        assert!(Error::timeout("stalled", Some(60.0)).is_retryable());
        assert!(!Error::EmptyReply.is_retryable());
        assert!(!Error::Interrupted.is_retryable());
    }

    #[test]
    fn api_display_uses_status() {
        let err = Error::api(400, Some("INVALID_ARGUMENT".to_string()), "bad contents");
        assert_eq!(err.to_string(), "INVALID_ARGUMENT (400): bad contents");
    }
}

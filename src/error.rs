//! Error types for the smart advisor.
//!
//! Every failure the streaming client can produce is a variant of [`Error`].  The chat
//! controller never lets these escape to the presentation layer; it classifies them with
//! [`Error::is_service_unavailable`] and shows a fallback message instead.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// The main error type for the smart advisor.
#[derive(Clone, Debug)]
pub enum Error {
    /// A status the advisor has no dedicated variant for (403, 404, ...).
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error status string from the API, e.g. `INVALID_ARGUMENT`.
        error_type: Option<String>,
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// The key was missing, malformed, or rejected with a 401.
    Authentication {
        message: String,
    },

    /// Quota exhausted (429).
    RateLimit {
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// The service rejected the request (400), or the prompt was blocked.
    BadRequest {
        message: String,
        /// Parameter that caused the error.
        param: Option<String>,
    },

    /// No response, or no next fragment, within the allowed time.
    Timeout {
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The service could not be reached.
    Connection {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Server failed or is overloaded (5xx).
    ServiceUnavailable {
        /// HTTP status code.
        status_code: u16,
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// Error during JSON or YAML serialization or deserialization.
    Serialization {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        message: String,
        source: Arc<io::Error>,
    },

    /// HTTP client error.
    HttpClient {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A request parameter or a transcript transition was rejected locally.
    Validation {
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// A URL parsing or manipulation error.
    Url {
        message: String,
        source: Option<url::ParseError>,
    },

    /// The reply stream broke after it was opened.
    Streaming {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The reply stream carried invalid UTF-8.
    Encoding {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        error_type: Option<String>,
        message: String,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            error_type,
            message,
            request_id,
        }
    }

    /// Maps an HTTP status and the decoded error body onto the matching variant.
    pub fn from_status(
        status_code: u16,
        error_type: Option<String>,
        message: String,
        request_id: Option<String>,
        retry_after: Option<u64>,
    ) -> Self {
        match status_code {
            400 => Error::bad_request(message, None),
            401 => Error::authentication(message),
            408 => Error::timeout(message, None),
            429 => Error::rate_limit(message, retry_after),
            500 | 502..=504 => Error::service_unavailable(status_code, message, retry_after),
            _ => Error::api(status_code, error_type, message, request_id),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
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
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
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

    /// Creates a new service unavailable error.
    pub fn service_unavailable(
        status_code: u16,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Error::ServiceUnavailable {
            status_code,
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

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
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

    /// Returns true if this error is related to rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if this error is a bad request.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::BadRequest { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if the stream failed after it was opened.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// Returns true if the remote text service could not deliver a reply.
    ///
    /// Network, auth, quota, timeout, decode and mid-stream failures all belong to this
    /// class.  Only local validation failures do not.
    pub fn is_service_unavailable(&self) -> bool {
        !matches!(self, Error::Validation { .. } | Error::Url { .. })
    }

    /// Returns the HTTP status associated with this error, if any.
    ///
    /// A 408 maps to [`Error::Timeout`], which reports no status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } | Error::ServiceUnavailable { status_code, .. } => {
                Some(*status_code)
            }
            Error::BadRequest { .. } => Some(400),
            Error::Authentication { .. } => Some(401),
            Error::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                message,
                error_type,
                request_id,
                ..
            } => {
                if let Some(error_type) = error_type {
                    if let Some(request_id) = request_id {
                        write!(f, "{error_type}: {message} (Request ID: {request_id})")
                    } else {
                        write!(f, "{error_type}: {message}")
                    }
                } else if let Some(request_id) = request_id {
                    write!(f, "API error: {message} (Request ID: {request_id})")
                } else {
                    write!(f, "API error: {message}")
                }
            }
            Error::Authentication { message } => {
                write!(f, "Authentication error: {message}")
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
            Error::BadRequest { message, param } => {
                if let Some(param) = param {
                    write!(f, "Bad request: {message} (parameter: {param})")
                } else {
                    write!(f, "Bad request: {message}")
                }
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::ServiceUnavailable {
                message,
                retry_after,
                ..
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
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
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
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
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

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
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

/// A specialized Result type for smart advisor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(Error::from_status(401, None, "bad key".into(), None, None).is_authentication());
        assert!(Error::from_status(429, None, "quota".into(), None, Some(7)).is_rate_limit());
        let err = Error::from_status(500, None, "down".into(), None, None);
        assert!(matches!(err, Error::ServiceUnavailable { .. }));
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(
            Error::from_status(403, Some("PERMISSION_DENIED".into()), "denied".into(), None, None)
                .status_code(),
            Some(403)
        );
        assert_eq!(
            Error::from_status(400, None, "bad".into(), None, None).status_code(),
            Some(400)
        );
        assert_eq!(Error::timeout("slow", None).status_code(), None);
        let err = Error::from_status(
            418,
            Some("TEAPOT".to_string()),
            "short and stout".into(),
            Some("req-1".to_string()),
            None,
        );
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.to_string(), "TEAPOT: short and stout (Request ID: req-1)");
    }

    #[test]
    fn service_unavailable_class() {
        assert!(Error::authentication("missing key").is_service_unavailable());
        assert!(Error::streaming("connection reset", None).is_service_unavailable());
        assert!(Error::timeout("slow", Some(60.0)).is_service_unavailable());
        assert!(Error::rate_limit("quota", None).is_service_unavailable());
        assert!(!Error::validation("empty prompt", None).is_service_unavailable());
    }

    #[test]
    fn io_source_is_exposed() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "advisor.yaml").into();
        assert!(error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("I/O error"));
    }
}

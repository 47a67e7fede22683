//! Error types for the Monzo API client.
//!
//! Every terminal failure is classified into exactly one [`ErrorKind`].
//! Callers should branch on [`Error::kind`] rather than on message text.

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for Monzo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, invalid or expired credentials; failed refresh or reauthorization.
    Authentication,
    /// The API rejected the request parameters.
    Validation,
    /// Any other unsuccessful response, exhausted network retries, or an
    /// undecodable success payload.
    Api,
    /// The API kept answering 429 until retries ran out.
    RateLimit,
    /// The client is missing local configuration (client id, redirect URI...).
    Configuration,
    /// The credential file could not be read or written.
    Storage,
}

/// The main error type for all Monzo API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication failed or no usable credential is available.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },

    /// The API rejected the request as malformed.
    #[error("Validation error: status={status}, message={message}")]
    Validation {
        /// HTTP status code
        status: u16,
        /// Human-readable error message
        message: String,
        /// Raw response body for debugging
        body: Value,
    },

    /// API returned an error response, or the request could not be completed.
    #[error("API error: status={status:?}, code={code:?}, message={message}")]
    Api {
        /// HTTP status code, absent for network-level failures
        status: Option<u16>,
        /// Optional error code from the API
        code: Option<String>,
        /// Human-readable error message
        message: String,
        /// Raw response body for debugging
        body: Value,
    },

    /// Rate limited by the API and retries were exhausted.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Human-readable error message
        message: String,
        /// Last `Retry-After` hint sent by the server, in seconds
        retry_after_secs: Option<u64>,
        /// Raw response body for debugging
        body: Value,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A resource looked up by name does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading or writing the credential file failed.
    #[error("Credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Classify this error.
    ///
    /// # Example
    ///
    /// ```
    /// use monzo_rs::{Error, ErrorKind};
    ///
    /// let err = Error::Config("client_id is required".into());
    /// assert_eq!(err.kind(), ErrorKind::Configuration);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Api { .. } | Error::NotFound(_) => ErrorKind::Api,
            Error::RateLimited { .. } => ErrorKind::RateLimit,
            Error::Config(_) | Error::UrlParse(_) => ErrorKind::Configuration,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The HTTP status that caused this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } | Error::Api { status, .. } => *status,
            Error::Validation { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns `true` if this error is potentially transient.
    ///
    /// The executor has already retried these up to the configured bound by
    /// the time they reach a caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Api { status: None, .. } => true,
            Error::Api { status: Some(s), .. } => *s >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns `true` if this error indicates a client-side issue.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Validation { .. } | Error::Config(_) | Error::NotFound(_) => true,
            Error::Api { status: Some(s), .. } => (400..500).contains(s),
            _ => false,
        }
    }

    /// Returns `true` if this error indicates a server-side issue.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status: Some(s), .. } if *s >= 500)
    }

    /// A response arrived but its body could not be decoded.
    pub(crate) fn decode(status: u16, err: serde_json::Error, body: Value) -> Self {
        Error::Api {
            status: Some(status),
            code: None,
            message: format!("failed to decode response: {err}"),
            body,
        }
    }

    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Error::Authentication {
            status: None,
            message: message.into(),
        }
    }

    /// Wrap any failure of a token-endpoint call as an authentication error,
    /// keeping the original status.
    pub(crate) fn into_auth(self, context: &str) -> Self {
        match self {
            err @ Error::Authentication { .. } => err,
            other => Error::Authentication {
                status: other.status(),
                message: format!("{context}: {other}"),
            },
        }
    }

    /// The API answered 401 and the refresh that followed failed.
    pub(crate) fn rejected_token(refresh_error: Error) -> Self {
        Error::Authentication {
            status: Some(401),
            message: format!("access token rejected and refresh failed: {refresh_error}"),
        }
    }

    /// Create an error from a non-success API response.
    ///
    /// Monzo error bodies look like `{"code": "...", "message": "..."}`.
    pub(crate) fn from_api_response(status: u16, body: Value) -> Self {
        let code = body
            .get("code")
            .and_then(|c| c.as_str())
            .map(String::from);

        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("API request failed: {status}"));

        match status {
            401 => Error::Authentication {
                status: Some(status),
                message,
            },
            429 => Error::RateLimited {
                message,
                retry_after_secs: None,
                body,
            },
            400 | 422 => Error::Validation {
                status,
                message,
                body,
            },
            _ => Error::Api {
                status: Some(status),
                code,
                message,
                body,
            },
        }
    }
}

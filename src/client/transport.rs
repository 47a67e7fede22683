//! The HTTP transport seam.
//!
//! [`Transport`] performs exactly one HTTP exchange and reports what happened
//! verbatim. Retry, authentication and error classification live above it in
//! the request executor.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// A fully resolved outbound request.
#[derive(Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL, without query string
    pub url: Url,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Query parameters, sent as given
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: RequestBody,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with no headers, query or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace or insert a header.
    pub(crate) fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Headers carry the bearer token.
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// A response as received, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, keys lower-cased
    pub headers: HashMap<String, String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, treating an empty body as `null`.
    pub fn json_value(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// What went wrong below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The attempt exceeded its timeout.
    Timeout,
    /// Connecting failed or the connection dropped mid-request.
    Connection,
    /// The request could not be built or sent for a non-transient reason.
    Other,
}

/// A network-level failure, distinct from any HTTP status.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    /// Failure category
    pub kind: TransportErrorKind,
    /// Description from the underlying client
    pub message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeouts and dropped connections are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::Connection
        )
    }
}

/// Performs a single HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send `request` and return the response exactly as received.
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given default timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> crate::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| crate::Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an existing client.
    pub fn from_client(http: reqwest::blocking::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().map_err(classify_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

//! Client configuration options.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Production API base URL.
pub const API_BASE_URL: &str = "https://api.monzo.com";
/// Browser-facing OAuth2 authorization URL.
pub const AUTH_URL: &str = "https://auth.monzo.com/";
/// OAuth2 token endpoint.
pub const TOKEN_URL: &str = "https://api.monzo.com/oauth2/token";
/// Default location of the credential file.
pub const DEFAULT_AUTH_FILE: &str = "config/auth.json";

/// Configuration for the Monzo client.
///
/// # Example
///
/// ```
/// use monzo_rs::{ClientConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("my-app/1.0")
///     .with_retry(RetryPolicy::no_retry());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout applied to every attempt
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Base URL for API requests
    pub api_base_url: String,
    /// Authorization page users are sent to
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh
    pub token_url: String,
    /// Retry policy, fixed for the lifetime of the client
    pub retry: RetryPolicy,
    /// Credential file, `None` disables persistence entirely
    pub auth_file: Option<PathBuf>,
    /// Save the credential file after every exchange or refresh
    pub auto_save: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("monzo-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            api_base_url: API_BASE_URL.to_string(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            retry: RetryPolicy::default(),
            auth_file: Some(PathBuf::from(DEFAULT_AUTH_FILE)),
            auto_save: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Point API and token requests at a different host.
    ///
    /// The token endpoint becomes `{base}/oauth2/token`.
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.token_url = format!("{}/oauth2/token", base_url.trim_end_matches('/'));
        self.api_base_url = base_url;
        self
    }

    /// Set the authorization page URL.
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the credential file location.
    pub fn with_auth_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_file = Some(path.into());
        self
    }

    /// Disable the credential file.
    pub fn without_auth_file(mut self) -> Self {
        self.auth_file = None;
        self
    }

    /// Enable or disable saving the credential after token changes.
    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }
}

/// Retry policy for transient failures.
///
/// The delay before retry `k` (the first retry is `k = 1`) is
/// `base_delay * 2^(k-1)`. A request is attempted at most
/// `1 + max_retries` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_delay` is zero.
    pub fn new(max_retries: u32, base_delay: Duration) -> Result<Self> {
        if base_delay.is_zero() {
            return Err(Error::Config("retry base delay must be positive".into()));
        }
        Ok(Self {
            max_retries,
            base_delay,
        })
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Total number of attempts, including the first.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (1-based). Retry 0 is the initial attempt
    /// and has no delay.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

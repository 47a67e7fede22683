//! Retrying request execution.
//!
//! [`RequestExecutor`] sends one logical request through a [`Transport`],
//! classifies every attempt into a [`RequestOutcome`] and retries transient
//! failures with exponential backoff. A 401 triggers exactly one token refresh
//! followed by exactly one resend.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::config::RetryPolicy;
use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::auth::TokenManager;
use crate::time::{Sleeper, ThreadSleeper};
use crate::{Error, Result};

/// Classified result of a single attempt.
#[derive(Debug)]
pub enum RequestOutcome {
    /// 2xx response.
    Success(HttpResponse),
    /// Worth another attempt (429, 5xx, timeout, dropped connection).
    RetryableFailure {
        /// The error to surface if no attempts remain
        error: Error,
        /// Minimum wait requested by the server
        wait_hint: Option<Duration>,
    },
    /// Must not be retried.
    FatalFailure(Error),
}

impl RequestOutcome {
    /// Classify the result of one transport call.
    pub fn classify(result: std::result::Result<HttpResponse, TransportError>) -> Self {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let transient = err.is_transient();
                let error = Error::Api {
                    status: None,
                    code: None,
                    message: format!("Request failed: {err}"),
                    body: serde_json::Value::Null,
                };
                return if transient {
                    RequestOutcome::RetryableFailure {
                        error,
                        wait_hint: None,
                    }
                } else {
                    RequestOutcome::FatalFailure(error)
                };
            }
        };

        if response.is_success() {
            return RequestOutcome::Success(response);
        }

        let status = response.status;
        let error = Error::from_api_response(status, response.json_value());
        match status {
            429 => {
                let wait_hint = response.header("retry-after").and_then(parse_retry_after);
                let error = match error {
                    Error::RateLimited { message, body, .. } => Error::RateLimited {
                        message,
                        retry_after_secs: wait_hint.map(|d| d.as_secs()),
                        body,
                    },
                    other => other,
                };
                RequestOutcome::RetryableFailure { error, wait_hint }
            }
            s if s >= 500 => RequestOutcome::RetryableFailure {
                error,
                wait_hint: None,
            },
            _ => RequestOutcome::FatalFailure(error),
        }
    }
}

/// Longest server-requested wait honoured between attempts.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// `Retry-After` in delta-seconds form, capped at [`MAX_RETRY_AFTER`].
/// HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(wait.min(MAX_RETRY_AFTER))
}

/// Executes requests with the client's retry policy.
///
/// The executor has no state beyond its immutable policy; every call is
/// retried independently.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestExecutor {
    /// Create an executor that sleeps on the calling thread between attempts.
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The retry policy in force.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send an authenticated request.
    ///
    /// The bearer token comes from `tokens`; if it has none, this fails with an
    /// authentication error before touching the network.
    pub fn execute(&self, request: &HttpRequest, tokens: &TokenManager) -> Result<HttpResponse> {
        self.run(request, Some(tokens))
    }

    /// Send a request without an `Authorization` header (token endpoint).
    pub fn execute_unauthenticated(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.run(request, None)
    }

    fn run(&self, request: &HttpRequest, tokens: Option<&TokenManager>) -> Result<HttpResponse> {
        let mut retries = 0u32;
        let mut refreshed = false;

        loop {
            let mut attempt = request.clone();
            let generation = match tokens {
                Some(tokens) => {
                    let grant = match tokens.authorize() {
                        Ok(grant) => grant,
                        Err(err) if refreshed => return Err(Error::rejected_token(err)),
                        Err(err) => return Err(err),
                    };
                    attempt.set_header(
                        "Authorization",
                        format!("Bearer {}", grant.token.expose_secret()),
                    );
                    Some(grant.generation)
                }
                None => None,
            };

            debug!(
                method = %attempt.method,
                url = %attempt.url,
                retry = retries,
                "sending request"
            );

            match RequestOutcome::classify(self.transport.send(&attempt)) {
                RequestOutcome::Success(response) => return Ok(response),
                RequestOutcome::FatalFailure(error) => {
                    if let (Some(tokens), Some(generation)) = (tokens, generation) {
                        if error.status() == Some(401) {
                            tokens.mark_rejected(generation);
                            if !refreshed {
                                refreshed = true;
                                warn!(url = %attempt.url, "access token rejected, refreshing once");
                                continue;
                            }
                        }
                    }
                    return Err(error);
                }
                RequestOutcome::RetryableFailure { error, wait_hint } => {
                    if retries >= self.policy.max_retries() {
                        warn!(
                            url = %attempt.url,
                            attempts = retries + 1,
                            error = %error,
                            "retries exhausted"
                        );
                        return Err(error);
                    }
                    retries += 1;
                    let backoff = self.policy.delay_for_retry(retries);
                    let delay = wait_hint.map_or(backoff, |hint| hint.max(backoff));
                    debug!(
                        url = %attempt.url,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, backing off"
                    );
                    self.sleeper.sleep(delay);
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, OAuthApp};
    use crate::client::testing::{ok_json, status, token_response, ScriptedTransport};
    use crate::time::testing::RecordingSleeper;
    use crate::ErrorKind;
    use reqwest::Method;
    use url::Url;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        sleeper: Arc<RecordingSleeper>,
        executor: Arc<RequestExecutor>,
    }

    fn harness(max_retries: u32, base_delay: Duration) -> Harness {
        let transport = Arc::new(ScriptedTransport::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = Arc::new(
            RequestExecutor::new(
                transport.clone(),
                RetryPolicy::new(max_retries, base_delay).unwrap(),
            )
            .with_sleeper(sleeper.clone()),
        );
        Harness {
            transport,
            sleeper,
            executor,
        }
    }

    fn tokens(executor: &Arc<RequestExecutor>) -> TokenManager {
        TokenManager::new(
            OAuthApp::new("client", "secret", "https://example.com/callback"),
            executor.clone(),
            "https://auth.example.com/",
            "https://api.example.com/oauth2/token",
        )
        .with_credential(Credential::new("access-1", Some("refresh-1".into()), None).unwrap())
    }

    fn accounts_request() -> HttpRequest {
        HttpRequest::new(
            Method::GET,
            Url::parse("https://api.example.com/accounts").unwrap(),
        )
    }

    #[test]
    fn test_always_503_makes_n_plus_one_attempts() {
        for n in 0..5 {
            let h = harness(n, Duration::from_millis(10));
            for _ in 0..=n {
                h.transport.push_api(status(503));
            }
            let tokens = tokens(&h.executor);

            let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Api);
            assert_eq!(err.status(), Some(503));
            assert_eq!(h.transport.api_calls(), (n + 1) as usize);
        }
    }

    #[test]
    fn test_backoff_doubles_each_retry() {
        let h = harness(4, Duration::from_millis(100));
        for _ in 0..5 {
            h.transport.push_api(status(500));
        }
        let tokens = tokens(&h.executor);

        let _ = h.executor.execute(&accounts_request(), &tokens);
        assert_eq!(
            h.sleeper.delays(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn test_retry_after_is_a_floor() {
        let h = harness(2, Duration::from_millis(100));
        h.transport
            .push_api(status(429).with_header("Retry-After", "2"));
        h.transport.push_api(ok_json(serde_json::json!({"accounts": []})));
        let tokens = tokens(&h.executor);

        h.executor.execute(&accounts_request(), &tokens).unwrap();
        assert_eq!(h.sleeper.delays(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_computed_backoff_wins_over_smaller_retry_after() {
        let h = harness(2, Duration::from_secs(5));
        h.transport
            .push_api(status(429).with_header("Retry-After", "1"));
        h.transport.push_api(ok_json(serde_json::json!({})));
        let tokens = tokens(&h.executor);

        h.executor.execute(&accounts_request(), &tokens).unwrap();
        assert_eq!(h.sleeper.delays(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn test_429_exhaustion_is_rate_limit_error() {
        let h = harness(1, Duration::from_millis(1));
        h.transport.push_api(status(429));
        h.transport
            .push_api(status(429).with_header("Retry-After", "3"));
        let tokens = tokens(&h.executor);

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        match err {
            Error::RateLimited {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, Some(3)),
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(h.transport.api_calls(), 2);
    }

    #[test]
    fn test_401_then_200_refreshes_once() {
        let h = harness(3, Duration::from_millis(1));
        h.transport.push_api(status(401));
        h.transport.push_api(ok_json(serde_json::json!({"ok": true})));
        h.transport.push_token(token_response("access-2", Some("refresh-2")));
        let tokens = tokens(&h.executor);

        let response = h.executor.execute(&accounts_request(), &tokens).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(h.transport.token_calls(), 1);
        assert_eq!(h.transport.api_calls(), 2);
        assert_eq!(
            h.transport.api_requests()[1].header("authorization"),
            Some("Bearer access-2")
        );
        assert!(h.sleeper.delays().is_empty());
    }

    #[test]
    fn test_401_twice_is_fatal() {
        let h = harness(3, Duration::from_millis(1));
        h.transport.push_api(status(401));
        h.transport.push_api(status(401));
        h.transport.push_api(ok_json(serde_json::json!({})));
        h.transport.push_token(token_response("access-2", None));
        let tokens = tokens(&h.executor);

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status(), Some(401));
        assert_eq!(h.transport.api_calls(), 2);
        assert_eq!(h.transport.token_calls(), 1);
    }

    #[test]
    fn test_401_with_failed_refresh_drops_credential() {
        let h = harness(0, Duration::from_millis(1));
        h.transport.push_api(status(401));
        h.transport.push_token(status(400));
        let tokens = tokens(&h.executor);

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("refresh failed"));
        assert!(tokens.credential().is_none());
        assert_eq!(h.transport.api_calls(), 1);
    }

    #[test]
    fn test_401_without_refresh_token_keeps_status() {
        let h = harness(2, Duration::from_millis(1));
        h.transport.push_api(status(401));
        let tokens = TokenManager::new(
            OAuthApp::default(),
            h.executor.clone(),
            "https://auth.example.com/",
            "https://api.example.com/oauth2/token",
        )
        .with_credential(Credential::new("access-only", None, None).unwrap());

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("No refresh token available"));
        assert_eq!(h.transport.api_calls(), 1);
        assert_eq!(h.transport.token_calls(), 0);
    }

    #[test]
    fn test_other_4xx_not_retried() {
        let h = harness(3, Duration::from_millis(1));
        h.transport.push_api(status(400));
        let tokens = tokens(&h.executor);

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.transport.api_calls(), 1);

        h.transport.push_api(status(404));
        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.status(), Some(404));
        assert_eq!(h.transport.api_calls(), 2);
        assert!(h.sleeper.delays().is_empty());
    }

    #[test]
    fn test_network_failures_are_retried() {
        let h = harness(2, Duration::from_millis(1));
        h.transport.push_api_error(crate::client::TransportErrorKind::Timeout);
        h.transport
            .push_api_error(crate::client::TransportErrorKind::Connection);
        h.transport.push_api(ok_json(serde_json::json!({})));
        let tokens = tokens(&h.executor);

        h.executor.execute(&accounts_request(), &tokens).unwrap();
        assert_eq!(h.transport.api_calls(), 3);
    }

    #[test]
    fn test_network_exhaustion_has_no_status() {
        let h = harness(1, Duration::from_millis(1));
        h.transport.push_api_error(crate::client::TransportErrorKind::Timeout);
        h.transport.push_api_error(crate::client::TransportErrorKind::Timeout);
        let tokens = tokens(&h.executor);

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_no_token_fails_without_network() {
        let h = harness(3, Duration::from_millis(1));
        let tokens = TokenManager::new(
            OAuthApp::default(),
            h.executor.clone(),
            "https://auth.example.com/",
            "https://api.example.com/oauth2/token",
        );

        let err = h.executor.execute(&accounts_request(), &tokens).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(h.transport.api_calls(), 0);
        assert_eq!(h.transport.token_calls(), 0);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
    }

    #[test]
    fn test_huge_retry_after_is_capped() {
        assert_eq!(parse_retry_after("1e20"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("inf"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("86400"), Some(MAX_RETRY_AFTER));

        let h = harness(1, Duration::from_millis(1));
        h.transport
            .push_api(status(429).with_header("Retry-After", "1e20"));
        h.transport.push_api(ok_json(serde_json::json!({})));
        let tokens = tokens(&h.executor);

        h.executor.execute(&accounts_request(), &tokens).unwrap();
        assert_eq!(h.sleeper.delays(), vec![MAX_RETRY_AFTER]);
    }
}

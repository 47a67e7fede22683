//! OAuth2 token lifecycle.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::credential::{AuthState, AuthorizationRequest, Credential, OAuthApp, DEFAULT_SCOPE};
use super::store::{CredentialStore, StoredAuth};
use crate::client::{HttpRequest, RequestBody, RequestExecutor};
use crate::time::{Clock, SystemClock};
use crate::{Error, Result};

/// Window after an interactive login during which the API grants access to
/// the full transaction history.
pub const RECENT_AUTH_WINDOW_MINUTES: u32 = 5;

/// Owns the current [`Credential`] and every transition of it.
///
/// Token-endpoint calls go through the shared [`RequestExecutor`], so they
/// get the same retry policy as API calls.
///
/// # Thread Safety
///
/// Refreshes are single-flight: a refresh gate serializes them, and every
/// credential replacement bumps a generation counter. A caller that waited on
/// the gate and finds the generation moved on reuses the new credential
/// instead of refreshing again. Credential file writes are serialized with
/// the state change they record, so the file never ends up older than the
/// manager.
pub struct TokenManager {
    state: Mutex<TokenState>,
    refresh_gate: Mutex<()>,
    save_gate: Mutex<()>,
    executor: Arc<RequestExecutor>,
    auth_url: String,
    token_url: String,
    clock: Arc<dyn Clock>,
    store: Option<CredentialStore>,
    auto_save: bool,
}

struct TokenState {
    app: OAuthApp,
    credential: Option<Credential>,
    generation: u64,
    rejected: bool,
}

/// A bearer token and the credential generation it belongs to.
pub(crate) struct Grant {
    pub(crate) token: SecretString,
    pub(crate) generation: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user_id: Option<String>,
}

impl TokenManager {
    /// Create an unauthenticated manager.
    pub fn new(
        app: OAuthApp,
        executor: Arc<RequestExecutor>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            state: Mutex::new(TokenState {
                app,
                credential: None,
                generation: 0,
                rejected: false,
            }),
            refresh_gate: Mutex::new(()),
            save_gate: Mutex::new(()),
            executor,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            clock: Arc::new(SystemClock),
            store: None,
            auto_save: false,
        }
    }

    /// Start from an existing credential.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.state.lock().credential = Some(credential);
        self
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a credential file. With `auto_save`, every exchange and
    /// refresh writes it.
    pub fn with_store(mut self, store: CredentialStore, auto_save: bool) -> Self {
        self.store = Some(store);
        self.auto_save = auto_save;
        self
    }

    /// The current credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.state.lock().credential.clone()
    }

    /// The OAuth application settings.
    pub fn app(&self) -> OAuthApp {
        self.state.lock().app.clone()
    }

    /// The attached credential file, if any.
    pub fn store(&self) -> Option<&CredentialStore> {
        self.store.as_ref()
    }

    /// Replace the credential, e.g. with one obtained elsewhere.
    pub fn set_credential(&self, credential: Credential) {
        let mut state = self.state.lock();
        state.credential = Some(credential);
        state.generation += 1;
        state.rejected = false;
    }

    /// Derived authentication state.
    pub fn auth_state(&self) -> AuthState {
        if self.credential().is_none() {
            AuthState::Unauthenticated
        } else if self.is_authentication_recent(RECENT_AUTH_WINDOW_MINUTES) {
            AuthState::RecentlyAuthenticated
        } else {
            AuthState::Authenticated
        }
    }

    /// Build the URL a user visits to grant access.
    ///
    /// A random state is generated when `state` is `None`; `scope` defaults
    /// to [`DEFAULT_SCOPE`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without a client id or redirect URI.
    pub fn build_authorization_url(&self, state: Option<&str>, scope: Option<&str>) -> Result<Url> {
        Ok(self.authorization_request(state, scope)?.url().clone())
    }

    /// Like [`build_authorization_url`](Self::build_authorization_url) but
    /// keeps the state for verifying the redirect.
    pub fn authorization_request(
        &self,
        state: Option<&str>,
        scope: Option<&str>,
    ) -> Result<AuthorizationRequest> {
        let app = self.app();
        let (Some(client_id), Some(redirect_uri)) = (app.client_id, app.redirect_uri) else {
            return Err(Error::Config(
                "client_id and redirect_uri are required for the OAuth flow".into(),
            ));
        };
        let state = state
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", &state)
            .append_pair("scope", scope.unwrap_or(DEFAULT_SCOPE));

        Ok(AuthorizationRequest::new(url, state))
    }

    /// Exchange an authorization code for a fresh credential.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] without client id, secret and redirect URI; an
    /// authentication error if the token endpoint does not answer 2xx.
    pub fn exchange_code_for_token(&self, code: &str) -> Result<Credential> {
        let app = self.app();
        let (Some(client_id), Some(client_secret), Some(redirect_uri)) =
            (app.client_id, app.client_secret, app.redirect_uri)
        else {
            return Err(Error::Config(
                "client_id, client_secret and redirect_uri are required for token exchange".into(),
            ));
        };

        let response = self
            .token_call(vec![
                ("grant_type", "authorization_code".to_string()),
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret().to_string()),
                ("redirect_uri", redirect_uri),
                ("code", code.to_string()),
            ])
            .map_err(|e| e.into_auth("Token exchange failed"))?;

        let credential = Credential::new(
            response.access_token,
            response.refresh_token,
            Some(self.clock.now()),
        )?;
        info!(user_id = ?response.user_id, expires_in = ?response.expires_in, "authorization code exchanged");
        self.install(credential.clone());
        Ok(credential)
    }

    /// Same as [`exchange_code_for_token`](Self::exchange_code_for_token);
    /// completes a reauthorization started out of band.
    pub fn perform_full_reauthentication(&self, code: &str) -> Result<Credential> {
        self.exchange_code_for_token(code)
    }

    /// Obtain a new access token with the refresh token.
    ///
    /// A refresh token missing from the response means the old one stays
    /// valid. Concurrent callers share one refresh.
    ///
    /// # Errors
    ///
    /// An authentication error without a refresh token, without client
    /// credentials, or when the token endpoint refuses.
    pub fn refresh_access_token(&self) -> Result<Credential> {
        let observed = self.state.lock().generation;
        self.refresh_single_flight(observed)
            .map(|(credential, _)| credential)
    }

    /// Whether the credential was obtained within `max_age_minutes`.
    ///
    /// Best effort: the server decides what history is visible. A credential
    /// with unknown issue time is never recent.
    pub fn is_authentication_recent(&self, max_age_minutes: u32) -> bool {
        let Some(obtained_at) = self.credential().and_then(|c| c.obtained_at()) else {
            return false;
        };
        self.clock.now() - obtained_at <= Duration::minutes(i64::from(max_age_minutes))
    }

    /// Make sure the credential comes from an interactive login inside the
    /// recency window, running a full reauthorization otherwise.
    ///
    /// `authorize` is the suspension point: it receives the authorization
    /// request, gets the user to approve it out of band, and returns the
    /// authorization code (see
    /// [`AuthorizationRequest::code_from_redirect`]).
    ///
    /// # Errors
    ///
    /// An authentication error when the OAuth application settings are
    /// incomplete, when `authorize` fails, or when the exchange fails.
    pub fn ensure_recent_authentication<F>(&self, authorize: F) -> Result<Credential>
    where
        F: FnOnce(&AuthorizationRequest) -> Result<String>,
    {
        if self.is_authentication_recent(RECENT_AUTH_WINDOW_MINUTES) {
            if let Some(credential) = self.credential() {
                return Ok(credential);
            }
        }
        if !self.app().is_complete() {
            return Err(Error::auth(
                "client_id, client_secret and redirect_uri are required for full reauthentication",
            ));
        }

        let request = self
            .authorization_request(None, None)
            .map_err(|e| e.into_auth("Reauthorization failed"))?;
        info!("full reauthorization required");
        let code = authorize(&request).map_err(|e| e.into_auth("Reauthorization failed"))?;
        self.exchange_code_for_token(&code)
            .map_err(|e| e.into_auth("Reauthorization failed"))
    }

    /// Return a usable credential, refreshing once if a request saw the
    /// current token rejected.
    ///
    /// # Errors
    ///
    /// An authentication error without an access token (no network call is
    /// made) or when the refresh fails, which leaves the manager
    /// unauthenticated.
    pub fn ensure_valid_token(&self) -> Result<Credential> {
        self.valid_credential().map(|(credential, _)| credential)
    }

    /// A usable credential together with the generation it belongs to.
    fn valid_credential(&self) -> Result<(Credential, u64)> {
        let (credential, rejected, generation) = {
            let state = self.state.lock();
            (state.credential.clone(), state.rejected, state.generation)
        };
        let Some(credential) = credential else {
            return Err(Error::auth("No access token provided; authenticate first"));
        };
        if !rejected {
            return Ok((credential, generation));
        }

        match self.refresh_single_flight(generation) {
            Ok(refreshed) => Ok(refreshed),
            Err(err) => {
                self.invalidate(generation);
                Err(err)
            }
        }
    }

    pub(crate) fn authorize(&self) -> Result<Grant> {
        let (credential, generation) = self.valid_credential()?;
        Ok(Grant {
            token: credential.access_token().clone(),
            generation,
        })
    }

    /// Record that a request sent with `generation`'s token got a 401.
    /// Stale reports for a replaced credential are ignored.
    pub(crate) fn mark_rejected(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.rejected = true;
        }
    }

    /// Write the credential file now.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] without a store; a storage error if writing fails.
    pub fn save(&self) -> Result<()> {
        let _save = self.save_gate.lock();
        self.write_store()
    }

    fn write_store(&self) -> Result<()> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::Config("no credential file configured".into()))?;
        let snapshot = {
            let state = self.state.lock();
            StoredAuth::from_parts(&state.app, state.credential.as_ref())
        };
        store.save(&snapshot)
    }

    /// Replace the credential and settings with the contents of `store`.
    pub fn load_from(&self, store: &CredentialStore) -> Result<()> {
        let stored = store.load()?;
        let mut state = self.state.lock();
        state.app = stored.app();
        state.credential = stored.credential();
        state.generation += 1;
        state.rejected = false;
        Ok(())
    }

    /// Refresh unless another caller already replaced the credential seen at
    /// generation `observed`. Returns the credential and its generation.
    fn refresh_single_flight(&self, observed: u64) -> Result<(Credential, u64)> {
        let _gate = self.refresh_gate.lock();

        let (app, refresh_token) = {
            let state = self.state.lock();
            if state.generation != observed && !state.rejected {
                if let Some(credential) = &state.credential {
                    debug!("credential refreshed by another caller");
                    return Ok((credential.clone(), state.generation));
                }
            }
            (
                state.app.clone(),
                state
                    .credential
                    .as_ref()
                    .and_then(|c| c.refresh_token().cloned()),
            )
        };

        let Some(refresh_token) = refresh_token else {
            return Err(Error::auth("No refresh token available"));
        };
        let (Some(client_id), Some(client_secret)) = (app.client_id, app.client_secret) else {
            return Err(Error::auth(
                "client_id and client_secret are required for token refresh",
            ));
        };

        debug!("refreshing access token");
        let response = self
            .token_call(vec![
                ("grant_type", "refresh_token".to_string()),
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret().to_string()),
                ("refresh_token", refresh_token.expose_secret().to_string()),
            ])
            .map_err(|e| e.into_auth("Token refresh failed"))?;

        let refresh_token = response
            .refresh_token
            .or_else(|| Some(refresh_token.expose_secret().to_string()));
        let credential =
            Credential::new(response.access_token, refresh_token, Some(self.clock.now()))?;
        info!(expires_in = ?response.expires_in, "access token refreshed");
        let generation = self.install(credential.clone());
        Ok((credential, generation))
    }

    fn token_call(&self, form: Vec<(&str, String)>) -> Result<TokenResponse> {
        let mut request = HttpRequest::new(Method::POST, Url::parse(&self.token_url)?);
        request.body = RequestBody::Form(
            form.into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        );

        let response = self.executor.execute_unauthenticated(&request)?;
        serde_json::from_slice(&response.body)
            .map_err(|e| Error::decode(response.status, e, response.json_value()))
    }

    fn install(&self, credential: Credential) -> u64 {
        let _save = self.save_gate.lock();
        let generation = {
            let mut state = self.state.lock();
            state.credential = Some(credential);
            state.generation += 1;
            state.rejected = false;
            state.generation
        };
        if self.auto_save && self.store.is_some() {
            if let Err(err) = self.write_store() {
                warn!(error = %err, "failed to save credential file");
            }
        }
        generation
    }

    fn invalidate(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            warn!("refresh failed, dropping credential");
            state.credential = None;
            state.generation += 1;
            state.rejected = false;
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenManager")
            .field("app", &state.app)
            .field("credential", &state.credential)
            .field("generation", &state.generation)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{status, token_response, ScriptedTransport};
    use crate::client::RetryPolicy;
    use crate::time::testing::{ManualClock, RecordingSleeper};
    use crate::ErrorKind;
    use chrono::{TimeZone, Utc};
    use std::time::Duration as StdDuration;

    fn setup(app: OAuthApp) -> (Arc<ScriptedTransport>, Arc<ManualClock>, TokenManager) {
        let transport = Arc::new(ScriptedTransport::default());
        let executor = Arc::new(
            RequestExecutor::new(
                transport.clone(),
                RetryPolicy::new(2, StdDuration::from_millis(1)).unwrap(),
            )
            .with_sleeper(Arc::new(RecordingSleeper::default())),
        );
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let manager = TokenManager::new(
            app,
            executor,
            "https://auth.monzo.com/",
            "https://api.monzo.com/oauth2/token",
        )
        .with_clock(clock.clone());
        (transport, clock, manager)
    }

    fn app() -> OAuthApp {
        OAuthApp::new("oauth2client_1", "s3cret", "https://example.com/callback")
    }

    #[test]
    fn test_authorization_url() {
        let (_, _, manager) = setup(app());
        let url = manager
            .build_authorization_url(Some("state-1"), None)
            .unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.host_str(), Some("auth.monzo.com"));
        assert!(pairs.contains(&("client_id".into(), "oauth2client_1".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "state-1".into())));
        assert!(pairs.contains(&("scope".into(), "openid email accounts".into())));
    }

    #[test]
    fn test_authorization_url_generates_state() {
        let (_, _, manager) = setup(app());
        let request = manager.authorization_request(None, Some("accounts")).unwrap();
        assert!(!request.state().is_empty());
        assert!(request
            .url()
            .query_pairs()
            .any(|(k, v)| k == "state" && v == request.state()));
    }

    #[test]
    fn test_authorization_url_requires_settings() {
        let (_, _, manager) = setup(OAuthApp::default());
        let err = manager.build_authorization_url(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_exchange_stores_credential() {
        let (transport, _, manager) = setup(app());
        transport.push_token(token_response("access-1", Some("refresh-1")));

        let credential = manager.exchange_code_for_token("code-1").unwrap();
        assert_eq!(credential.access_token().expose_secret(), "access-1");
        assert_eq!(manager.auth_state(), AuthState::RecentlyAuthenticated);

        let sent = &transport.token_requests()[0];
        match &sent.body {
            RequestBody::Form(fields) => {
                assert!(fields.contains(&("grant_type".into(), "authorization_code".into())));
                assert!(fields.contains(&("code".into(), "code-1".into())));
            }
            other => panic!("expected form body, got {other:?}"),
        }
        assert!(sent.header("authorization").is_none());
    }

    #[test]
    fn test_exchange_failure_is_auth_error() {
        let (transport, _, manager) = setup(app());
        transport.push_token(status(400));

        let err = manager.exchange_code_for_token("bad").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status(), Some(400));
        assert_eq!(manager.auth_state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_exchange_requires_settings() {
        let (transport, _, manager) = setup(OAuthApp::default());
        let err = manager.exchange_code_for_token("code").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(transport.token_calls(), 0);
    }

    #[test]
    fn test_recency_expires_after_window() {
        let (transport, clock, manager) = setup(app());
        transport.push_token(token_response("access-1", Some("refresh-1")));
        manager.exchange_code_for_token("code").unwrap();

        assert!(manager.is_authentication_recent(5));
        clock.advance(Duration::minutes(5));
        assert!(manager.is_authentication_recent(5));
        clock.advance(Duration::seconds(1));
        assert!(!manager.is_authentication_recent(5));
        assert!(manager.is_authentication_recent(10));
        assert_eq!(manager.auth_state(), AuthState::Authenticated);
    }

    #[test]
    fn test_unknown_issue_time_is_not_recent() {
        let (_, _, manager) = setup(app());
        let manager = manager.with_credential(Credential::new("a", None, None).unwrap());
        assert!(!manager.is_authentication_recent(5));
        assert_eq!(manager.auth_state(), AuthState::Authenticated);
    }

    #[test]
    fn test_refresh_keeps_refresh_token_when_omitted() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("keep-me".into()), None).unwrap());
        transport.push_token(token_response("new", None));

        let credential = manager.refresh_access_token().unwrap();
        assert_eq!(credential.access_token().expose_secret(), "new");
        assert_eq!(
            credential.refresh_token().map(|t| t.expose_secret().to_string()),
            Some("keep-me".to_string())
        );
        assert!(credential.obtained_at().is_some());
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let (transport, _, manager) = setup(app());
        let manager = manager.with_credential(Credential::new("old", None, None).unwrap());

        let err = manager.refresh_access_token().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(transport.token_calls(), 0);
    }

    #[test]
    fn test_refresh_retries_server_errors() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap());
        transport.push_token(status(502));
        transport.push_token(token_response("new", Some("r2")));

        manager.refresh_access_token().unwrap();
        assert_eq!(transport.token_calls(), 2);
    }

    #[test]
    fn test_ensure_valid_token_without_token() {
        let (transport, _, manager) = setup(app());
        let err = manager.ensure_valid_token().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(transport.token_calls() + transport.api_calls(), 0);
    }

    #[test]
    fn test_ensure_valid_token_refreshes_after_rejection() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap());
        assert_eq!(
            manager.ensure_valid_token().unwrap().access_token().expose_secret(),
            "old"
        );

        let generation = manager.authorize().unwrap().generation;
        manager.mark_rejected(generation);
        transport.push_token(token_response("new", None));

        let credential = manager.ensure_valid_token().unwrap();
        assert_eq!(credential.access_token().expose_secret(), "new");
        assert_eq!(transport.token_calls(), 1);

        // A late 401 for the old token must not force another refresh.
        manager.mark_rejected(generation);
        manager.ensure_valid_token().unwrap();
        assert_eq!(transport.token_calls(), 1);
    }

    #[test]
    fn test_failed_refresh_after_rejection_unauthenticates() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap());
        manager.mark_rejected(manager.authorize().unwrap().generation);
        transport.push_token(status(401));

        let err = manager.ensure_valid_token().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(manager.auth_state(), AuthState::Unauthenticated);
        assert!(manager.ensure_valid_token().is_err());
        assert_eq!(transport.token_calls(), 1);
    }

    #[test]
    fn test_ensure_recent_authentication_skips_when_recent() {
        let (transport, _, manager) = setup(app());
        transport.push_token(token_response("fresh", Some("r")));
        manager.exchange_code_for_token("code").unwrap();

        let credential = manager
            .ensure_recent_authentication(|_| panic!("should not prompt"))
            .unwrap();
        assert_eq!(credential.access_token().expose_secret(), "fresh");
        assert_eq!(transport.token_calls(), 1);
    }

    #[test]
    fn test_ensure_recent_authentication_runs_callback() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("stale", Some("r".into()), None).unwrap());
        transport.push_token(token_response("fresh", Some("r2")));

        let credential = manager
            .ensure_recent_authentication(|request| {
                let redirect = format!(
                    "https://example.com/callback?code=abc&state={}",
                    request.state()
                );
                request.code_from_redirect(&redirect)
            })
            .unwrap();

        assert_eq!(credential.access_token().expose_secret(), "fresh");
        assert!(manager.is_authentication_recent(5));
    }

    #[test]
    fn test_ensure_recent_authentication_requires_settings() {
        let (_, _, manager) = setup(OAuthApp {
            client_id: Some("c".into()),
            ..Default::default()
        });
        let err = manager
            .ensure_recent_authentication(|_| Ok("code".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_concurrent_rejections_refresh_once() {
        let (transport, _, manager) = setup(app());
        let manager = Arc::new(
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap()),
        );
        let generation = manager.authorize().unwrap().generation;
        manager.mark_rejected(generation);
        transport.push_token(token_response("new", None));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || manager.ensure_valid_token())
            })
            .collect();
        for handle in handles {
            let credential = handle.join().unwrap().unwrap();
            assert_eq!(credential.access_token().expose_secret(), "new");
        }
        assert_eq!(transport.token_calls(), 1);
    }

    #[test]
    fn test_grant_generation_belongs_to_its_token() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap());
        let stale = manager.authorize().unwrap();
        manager.mark_rejected(stale.generation);
        transport.push_token(token_response("new", None));

        let fresh = manager.authorize().unwrap();
        assert_eq!(fresh.token.expose_secret(), "new");
        assert_ne!(fresh.generation, stale.generation);

        // The old token's 401 arriving late leaves the new token alone.
        manager.mark_rejected(stale.generation);
        assert_eq!(
            manager.authorize().unwrap().generation,
            fresh.generation
        );
        assert_eq!(transport.token_calls(), 1);

        // A 401 for the new token is acted on.
        manager.mark_rejected(fresh.generation);
        transport.push_token(token_response("newer", None));
        assert_eq!(manager.authorize().unwrap().token.expose_secret(), "newer");
        assert_eq!(transport.token_calls(), 2);
    }

    #[test]
    fn test_grant_taken_before_replacement_is_stale() {
        let (transport, _, manager) = setup(app());
        let manager =
            manager.with_credential(Credential::new("old", Some("r".into()), None).unwrap());
        let before = manager.authorize().unwrap();
        manager.set_credential(Credential::new("replaced", Some("r".into()), None).unwrap());

        manager.mark_rejected(before.generation);
        let grant = manager.authorize().unwrap();
        assert_eq!(grant.token.expose_secret(), "replaced");
        assert_eq!(transport.token_calls(), 0);
    }

    #[test]
    fn test_concurrent_exchanges_leave_file_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("auth.json"));
        let (transport, _, manager) = setup(app());
        let manager = Arc::new(manager.with_store(store.clone(), true));
        for i in 0..8 {
            transport.push_token(token_response(&format!("access-{i}"), Some("r")));
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || manager.exchange_code_for_token(&format!("code-{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let current = manager.credential().unwrap();
        let stored = store.load().unwrap();
        assert_eq!(
            stored.access_token.as_deref(),
            Some(current.access_token().expose_secret())
        );
    }

    #[test]
    fn test_auto_save_after_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("auth.json"));
        let (transport, _, manager) = setup(app());
        let manager = manager.with_store(store.clone(), true);
        transport.push_token(token_response("saved", Some("r")));

        manager.exchange_code_for_token("code").unwrap();
        let stored = store.load().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("saved"));
        assert_eq!(stored.client_id.as_deref(), Some("oauth2client_1"));
        assert!(stored.obtained_at.is_some());
    }
}

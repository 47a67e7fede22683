//! HTTP client implementation for the Monzo API.

use std::sync::Arc;

use reqwest::Method;
use secrecy::SecretString;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::api::{
    AccountsService, AttachmentsService, BalancesService, FeedService, PotsService,
    TransactionsService, WebhooksService,
};
use crate::auth::{
    AuthState, AuthorizationRequest, Credential, CredentialStore, OAuthApp, TokenManager,
};
use crate::models::WhoAmI;
use crate::time::{Clock, Sleeper};
use crate::{Error, Result};

use super::config::ClientConfig;
use super::executor::RequestExecutor;
use super::transport::{HttpRequest, HttpResponse, RequestBody, ReqwestTransport, Transport};

/// The main client for interacting with the Monzo API.
///
/// The client owns a [`TokenManager`] and a [`RequestExecutor`]; every
/// service returned by it shares both. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use monzo_rs::MonzoClient;
///
/// # fn example() -> monzo_rs::Result<()> {
/// let client = MonzoClient::from_env()?;
///
/// for account in client.accounts().list()? {
///     let balance = client.balances().get(&account.id)?;
///     println!("{}: {} {}", account.id, balance.balance, balance.currency);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MonzoClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) executor: Arc<RequestExecutor>,
    pub(crate) tokens: TokenManager,
    pub(crate) config: ClientConfig,
}

impl MonzoClient {
    /// Start configuring a client.
    pub fn builder() -> MonzoClientBuilder {
        MonzoClientBuilder::default()
    }

    /// Create a client from an access token alone.
    ///
    /// The credential file is still consulted for OAuth settings, so a
    /// refresh can succeed if one was saved earlier.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::builder().access_token(access_token).build()
    }

    /// Create a client from `MONZO_*` environment variables, falling back
    /// to the credential file.
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Get the accounts service.
    pub fn accounts(&self) -> AccountsService {
        AccountsService::new(self.inner.clone())
    }

    /// Get the balances service.
    pub fn balances(&self) -> BalancesService {
        BalancesService::new(self.inner.clone())
    }

    /// Get the transactions service.
    pub fn transactions(&self) -> TransactionsService {
        TransactionsService::new(self.inner.clone())
    }

    /// Get the pots service.
    pub fn pots(&self) -> PotsService {
        PotsService::new(self.inner.clone())
    }

    /// Get the webhooks service.
    pub fn webhooks(&self) -> WebhooksService {
        WebhooksService::new(self.inner.clone())
    }

    /// Get the feed service.
    pub fn feed(&self) -> FeedService {
        FeedService::new(self.inner.clone())
    }

    /// Get the attachments service.
    pub fn attachments(&self) -> AttachmentsService {
        AttachmentsService::new(self.inner.clone())
    }

    /// Information about the token in use.
    pub fn whoami(&self) -> Result<WhoAmI> {
        self.inner.get("/ping/whoami")
    }

    /// The token manager behind this client.
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.inner.tokens.auth_state()
    }

    /// Build the URL a user visits to grant access.
    pub fn authorization_url(&self, state: Option<&str>, scope: Option<&str>) -> Result<Url> {
        self.inner.tokens.build_authorization_url(state, scope)
    }

    /// Start an interactive authorization, keeping the state for checking
    /// the redirect.
    pub fn authorization_request(&self, scope: Option<&str>) -> Result<AuthorizationRequest> {
        self.inner.tokens.authorization_request(None, scope)
    }

    /// Exchange an authorization code for tokens.
    pub fn exchange_code_for_token(&self, code: &str) -> Result<Credential> {
        self.inner.tokens.exchange_code_for_token(code)
    }

    /// Refresh the access token now.
    pub fn refresh_access_token(&self) -> Result<Credential> {
        self.inner.tokens.refresh_access_token()
    }

    /// Whether the user logged in interactively within `max_age_minutes`.
    pub fn is_authentication_recent(&self, max_age_minutes: u32) -> bool {
        self.inner.tokens.is_authentication_recent(max_age_minutes)
    }

    /// See [`TokenManager::ensure_recent_authentication`].
    pub fn ensure_recent_authentication<F>(&self, authorize: F) -> Result<Credential>
    where
        F: FnOnce(&AuthorizationRequest) -> Result<String>,
    {
        self.inner.tokens.ensure_recent_authentication(authorize)
    }

    /// Complete a reauthorization with a code obtained out of band.
    pub fn perform_full_reauthentication(&self, code: &str) -> Result<Credential> {
        self.inner.tokens.perform_full_reauthentication(code)
    }

    /// Write tokens and OAuth settings to the credential file.
    pub fn save_auth(&self) -> Result<()> {
        self.inner.tokens.save()
    }

    /// Replace tokens and OAuth settings with the credential file contents.
    pub fn load_auth(&self) -> Result<()> {
        let store = self
            .inner
            .tokens
            .store()
            .ok_or_else(|| Error::Config("no credential file configured".into()))?;
        self.inner.tokens.load_from(store)
    }
}

impl ClientInner {
    /// Resolve an API path against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let base = self.config.api_base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<HttpRequest> {
        Ok(HttpRequest::new(method, self.url(path)?))
    }

    /// Make a GET request.
    pub(crate) fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::GET, path)?;
        self.send(&request)
    }

    /// Make a GET request with query parameters.
    pub(crate) fn get_with_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let mut request = self.request(Method::GET, path)?;
        request.query = to_pairs(query)?;
        self.send(&request)
    }

    /// POST a form-encoded body.
    pub(crate) fn post_form<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut request = self.request(Method::POST, path)?;
        request.body = RequestBody::Form(to_pairs(body)?);
        self.send(&request)
    }

    /// POST a JSON body.
    pub(crate) fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut request = self.request(Method::POST, path)?;
        request.body = RequestBody::Json(to_json(body)?);
        self.send(&request)
    }

    /// PUT a form-encoded body.
    pub(crate) fn put_form<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut request = self.request(Method::PUT, path)?;
        request.body = RequestBody::Form(to_pairs(body)?);
        self.send(&request)
    }

    /// PATCH a JSON body.
    pub(crate) fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut request = self.request(Method::PATCH, path)?;
        request.body = RequestBody::Json(to_json(body)?);
        self.send(&request)
    }

    /// Make a DELETE request, ignoring any response body.
    pub(crate) fn delete(&self, path: &str) -> Result<()> {
        let request = self.request(Method::DELETE, path)?;
        self.send::<IgnoredAny>(&request).map(|_| ())
    }

    /// Make a DELETE request with a JSON body, ignoring any response body.
    pub(crate) fn delete_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let mut request = self.request(Method::DELETE, path)?;
        request.body = RequestBody::Json(to_json(body)?);
        self.send::<IgnoredAny>(&request).map(|_| ())
    }

    fn send<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T> {
        let response = self.executor.execute(request, &self.tokens)?;
        decode(&response)
    }
}

/// Decode a successful response. An empty body decodes as `null`.
pub(crate) fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    let value = response.json_value();
    match T::deserialize(&value) {
        Ok(decoded) => Ok(decoded),
        Err(err) => {
            debug!(status = response.status, error = %err, "response did not match expected shape");
            Err(Error::decode(response.status, err, value))
        }
    }
}

fn to_json<B: Serialize>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| Error::Config(format!("failed to encode request: {e}")))
}

/// Flatten a serializable struct into key/value pairs for a query string or
/// form body. Pairs come out sorted by key, not in field order. `None`
/// fields are skipped; nested values are sent as JSON text.
pub(crate) fn to_pairs<B: Serialize>(body: &B) -> Result<Vec<(String, String)>> {
    let pairs = match to_json(body)? {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, value))
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(Error::Config(format!(
                "request parameters must be an object, got {other}"
            )))
        }
    };
    Ok(pairs)
}

/// Builder for [`MonzoClient`].
///
/// Values set here win over environment variables (read only after
/// [`with_env`](Self::with_env)), which win over the credential file. The
/// file is read only when no access token was found otherwise, and then only
/// fills settings that are still missing.
///
/// # Example
///
/// ```no_run
/// use monzo_rs::{ClientConfig, MonzoClient};
///
/// # fn example() -> monzo_rs::Result<()> {
/// let client = MonzoClient::builder()
///     .client_id("oauth2client_00009abc")
///     .client_secret("mnzconf.secret")
///     .redirect_uri("http://localhost:8080/callback")
///     .config(ClientConfig::default().with_auth_file("auth.json"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MonzoClientBuilder {
    config: ClientConfig,
    app: OAuthApp,
    access_token: Option<String>,
    refresh_token: Option<String>,
    use_env: bool,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl MonzoClientBuilder {
    /// Use a custom configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the OAuth client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.app.client_id = Some(client_id.into());
        self
    }

    /// Set the OAuth client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.app.client_secret = Some(SecretString::from(client_secret.into()));
        self
    }

    /// Set the OAuth redirect URI.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.app.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set the access token.
    pub fn access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Set the refresh token.
    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Fill missing values from `MONZO_*` environment variables.
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Send requests through a custom transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom clock for authentication recency.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom sleeper between retries.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the API base URL is invalid or the HTTP client
    /// cannot be created; an authentication error for an empty access token.
    pub fn build(self) -> Result<MonzoClient> {
        let config = self.config;
        Url::parse(&config.api_base_url)?;

        let mut app = self.app;
        let mut credential = match self.access_token {
            Some(access) => Some(Credential::new(access, self.refresh_token, None)?),
            None => None,
        };

        if self.use_env {
            app = app.or(OAuthApp::from_env());
            if credential.is_none() {
                credential = Credential::from_env();
            }
        }

        let store = config.auth_file.clone().map(CredentialStore::new);
        if let Some(store) = store.as_ref().filter(|s| s.exists()) {
            match store.load() {
                Ok(stored) => {
                    app = app.or(stored.app());
                    if credential.is_none() {
                        credential = stored.credential();
                    }
                }
                Err(err) => {
                    warn!(path = %store.path().display(), error = %err, "ignoring unreadable credential file")
                }
            }
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.timeout, &config.user_agent)?),
        };
        let mut executor = RequestExecutor::new(transport, config.retry);
        if let Some(sleeper) = self.sleeper {
            executor = executor.with_sleeper(sleeper);
        }
        let executor = Arc::new(executor);

        let mut tokens = TokenManager::new(
            app,
            executor.clone(),
            config.auth_url.clone(),
            config.token_url.clone(),
        );
        if let Some(clock) = self.clock {
            tokens = tokens.with_clock(clock);
        }
        if let Some(store) = store {
            tokens = tokens.with_store(store, config.auto_save);
        }
        if let Some(credential) = credential {
            tokens = tokens.with_credential(credential);
        }

        debug!(base_url = %config.api_base_url, auth_state = ?tokens.auth_state(), "client ready");
        Ok(MonzoClient {
            inner: Arc::new(ClientInner {
                executor,
                tokens,
                config,
            }),
        })
    }
}

impl Clone for MonzoClient {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for MonzoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonzoClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl std::fmt::Debug for MonzoClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonzoClientBuilder")
            .field("config", &self.config)
            .field("app", &self.app)
            .field("use_env", &self.use_env)
            .finish_non_exhaustive()
    }
}

//! Credential and OAuth application settings.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::{Error, Result};

/// Scope requested when none is given.
pub const DEFAULT_SCOPE: &str = "openid email accounts";

/// OAuth2 application registration.
///
/// All three values are needed for the authorization-code flow; a client
/// that only holds an access token can leave them empty.
#[derive(Clone, Default)]
pub struct OAuthApp {
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<SecretString>,
    /// Redirect URI registered with the client
    pub redirect_uri: Option<String>,
}

impl OAuthApp {
    /// Create a fully populated application.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(SecretString::from(client_secret.into())),
            redirect_uri: Some(redirect_uri.into()),
        }
    }

    /// Read `MONZO_CLIENT_ID`, `MONZO_CLIENT_SECRET` and `MONZO_REDIRECT_URI`.
    pub fn from_env() -> Self {
        Self {
            client_id: non_empty_env("MONZO_CLIENT_ID"),
            client_secret: non_empty_env("MONZO_CLIENT_SECRET").map(SecretString::from),
            redirect_uri: non_empty_env("MONZO_REDIRECT_URI"),
        }
    }

    /// Fill every unset field from `other`.
    pub fn or(self, other: OAuthApp) -> Self {
        Self {
            client_id: self.client_id.or(other.client_id),
            client_secret: self.client_secret.or(other.client_secret),
            redirect_uri: self.redirect_uri.or(other.redirect_uri),
        }
    }

    /// Whether client id, secret and redirect URI are all present.
    pub fn is_complete(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.redirect_uri.is_some()
    }
}

impl fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// An access token and what is known about it.
#[derive(Clone)]
pub struct Credential {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    obtained_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Create a credential.
    ///
    /// `obtained_at` is `None` for tokens whose issue time is unknown (for
    /// example ones pasted from the developer portal); such credentials are
    /// never considered recently authenticated.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if `access_token` is empty.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        obtained_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(Error::auth("access token must not be empty"));
        }
        Ok(Self {
            access_token: SecretString::from(access_token),
            refresh_token: refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            obtained_at,
        })
    }

    /// Read `MONZO_ACCESS_TOKEN` and `MONZO_REFRESH_TOKEN`.
    pub fn from_env() -> Option<Self> {
        let access = non_empty_env("MONZO_ACCESS_TOKEN")?;
        Self::new(access, non_empty_env("MONZO_REFRESH_TOKEN"), None).ok()
    }

    /// The bearer token.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// The refresh token, if the server issued one.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// When the access token was obtained, if known.
    pub fn obtained_at(&self) -> Option<DateTime<Utc>> {
        self.obtained_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.as_ref().map(|t| t.expose_secret())
                == other.refresh_token.as_ref().map(|t| t.expose_secret())
            && self.obtained_at == other.obtained_at
    }
}

/// How strongly the client is currently authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No access token.
    Unauthenticated,
    /// An access token is held.
    Authenticated,
    /// An access token is held and was obtained inside the recency window,
    /// which unlocks full transaction history.
    RecentlyAuthenticated,
}

/// An authorization URL handed to the user, with the state it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    url: Url,
    state: String,
}

impl AuthorizationRequest {
    pub(crate) fn new(url: Url, state: String) -> Self {
        Self { url, state }
    }

    /// The URL the user must open.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The anti-CSRF state embedded in the URL.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Extract the authorization code from the URL the user was redirected to.
    ///
    /// # Errors
    ///
    /// Fails with an authentication error if the redirect carries an OAuth
    /// `error`, has no `code`, or carries a `state` that does not match.
    pub fn code_from_redirect(&self, redirect_url: &str) -> Result<String> {
        let redirect = Url::parse(redirect_url.trim())?;
        let mut code = None;
        let mut state = None;
        let mut error = None;
        for (key, value) in redirect.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(Error::auth(format!("authorization was denied: {error}")));
        }
        if let Some(state) = state {
            if state != self.state {
                return Err(Error::auth("authorization state does not match"));
            }
        }
        code.filter(|c| !c.is_empty())
            .ok_or_else(|| Error::auth("redirect URL has no authorization code"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

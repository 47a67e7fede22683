//! Credential file persistence.
//!
//! The file is a flat JSON object holding the tokens and the OAuth
//! application settings. Saves go to a temporary file in the same directory
//! which is then renamed over the target, so a crash never leaves a
//! half-written credential file behind.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credential::{Credential, OAuthApp};
use crate::Result;

/// On-disk layout of the credential file.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredAuth {
    /// Access token
    #[serde(default)]
    pub access_token: Option<String>,
    /// OAuth client id
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(default)]
    pub client_secret: Option<String>,
    /// When the access token was obtained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
    /// OAuth redirect URI
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl StoredAuth {
    /// Snapshot the given settings and credential.
    pub fn from_parts(app: &OAuthApp, credential: Option<&Credential>) -> Self {
        Self {
            access_token: credential.map(|c| c.access_token().expose_secret().to_string()),
            client_id: app.client_id.clone(),
            client_secret: app
                .client_secret
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
            obtained_at: credential.and_then(Credential::obtained_at),
            redirect_uri: app.redirect_uri.clone(),
            refresh_token: credential
                .and_then(Credential::refresh_token)
                .map(|t| t.expose_secret().to_string()),
        }
    }

    /// The OAuth application settings in this file.
    pub fn app(&self) -> OAuthApp {
        OAuthApp {
            client_id: self.client_id.clone().filter(|v| !v.is_empty()),
            client_secret: self
                .client_secret
                .clone()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            redirect_uri: self.redirect_uri.clone().filter(|v| !v.is_empty()),
        }
    }

    /// The credential in this file, if it holds an access token.
    pub fn credential(&self) -> Option<Credential> {
        let access = self.access_token.clone()?;
        Credential::new(access, self.refresh_token.clone(), self.obtained_at).ok()
    }
}

impl fmt::Debug for StoredAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("StoredAuth")
            .field("access_token", &redact(&self.access_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("obtained_at", &self.obtained_at)
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Reads and atomically writes a [`StoredAuth`] file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// A store backed by `path`. Nothing is touched until `load` or `save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the file.
    pub fn load(&self) -> Result<StoredAuth> {
        let bytes = fs::read(&self.path)?;
        let stored = serde_json::from_slice(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        debug!(path = %self.path.display(), "loaded credential file");
        Ok(stored)
    }

    /// Replace the file atomically, creating parent directories as needed.
    pub fn save(&self, auth: &StoredAuth) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, auth)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), "saved credential file");
        Ok(())
    }
}

//! OAuth2 authentication for the Monzo API.
//!
//! [`TokenManager`] owns the current [`Credential`] and performs every
//! transition of it: authorization-code exchange, refresh, and interactive
//! reauthorization when full transaction history is needed.
//!
//! # Authorization code flow
//!
//! ```no_run
//! use monzo_rs::MonzoClient;
//!
//! # fn example() -> monzo_rs::Result<()> {
//! let client = MonzoClient::builder()
//!     .client_id("oauth2client_00009abc")
//!     .client_secret("mnzconf.secret")
//!     .redirect_uri("http://localhost:8080/callback")
//!     .build()?;
//!
//! let request = client.authorization_request(None)?;
//! println!("Open {}", request.url());
//!
//! // The user approves in the browser and pastes the redirect URL back.
//! let redirect = "http://localhost:8080/callback?code=abc&state=...";
//! let code = request.code_from_redirect(redirect)?;
//! client.exchange_code_for_token(&code)?;
//! client.save_auth()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Recent authentication
//!
//! Monzo only returns transactions older than 90 days to a token obtained
//! in the last five minutes. [`TokenManager::ensure_recent_authentication`]
//! runs a new authorization through a caller-supplied callback when needed.

mod credential;
mod store;
mod token_manager;

pub use credential::{AuthState, AuthorizationRequest, Credential, OAuthApp, DEFAULT_SCOPE};
pub use store::{CredentialStore, StoredAuth};
pub use token_manager::{TokenManager, RECENT_AUTH_WINDOW_MINUTES};

//! # monzo-rs
//!
//! A blocking Rust client for the Monzo personal-banking API.
//!
//! The client manages the OAuth2 token lifecycle, retries transient failures
//! with exponential backoff, honours `Retry-After` on rate limits and
//! refreshes an expired access token once before giving up.
//!
//! ## Features
//!
//! - **Authentication**: authorization-code flow, refresh, recent-login checks
//! - **Accounts and balances**: open accounts, balances with foreign spend
//! - **Transactions**: filtering, automatic pagination, annotations, receipts
//! - **Pots**: lookup by name, deposits and withdrawals with dedupe ids
//! - **Webhooks, feed items and attachments**
//! - **Credential file**: tokens survive restarts, written atomically
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use monzo_rs::MonzoClient;
//! use monzo_rs::models::TransactionsQuery;
//!
//! fn main() -> monzo_rs::Result<()> {
//!     // MONZO_ACCESS_TOKEN etc., falling back to config/auth.json
//!     let client = MonzoClient::from_env()?;
//!
//!     let accounts = client.accounts().list()?;
//!     println!("Found {} accounts", accounts.len());
//!
//!     if let Some(account) = accounts.first() {
//!         let balance = client.balances().get(&account.id)?;
//!         println!("Balance: {} {}", balance.balance, balance.currency);
//!
//!         let transactions = client
//!             .transactions()
//!             .list(&account.id, TransactionsQuery::new().limit(20))?;
//!         for tx in transactions {
//!             println!("{} {:>8} {}", tx.created, tx.amount, tx.description);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Full transaction history
//!
//! Transactions older than 90 days are only returned within five minutes of
//! an interactive login:
//!
//! ```rust,no_run
//! use monzo_rs::MonzoClient;
//! use monzo_rs::models::TransactionsQuery;
//!
//! # fn example(client: MonzoClient, read_line: impl Fn() -> String) -> monzo_rs::Result<()> {
//! client.ensure_recent_authentication(|request| {
//!     println!("Open {} and paste the redirect URL:", request.url());
//!     request.code_from_redirect(&read_line())
//! })?;
//!
//! let account = &client.accounts().list()?[0];
//! let all = client
//!     .transactions()
//!     .list_all(&account.id, TransactionsQuery::new(), None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every failure maps to one [`ErrorKind`]; match on [`Error::kind`] rather
//! than on messages.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod time;

pub use auth::{AuthState, AuthorizationRequest, Credential, CredentialStore, OAuthApp, TokenManager};
pub use client::{ClientConfig, MonzoClient, MonzoClientBuilder, RetryPolicy};
pub use error::{Error, ErrorKind, Result};

/// Prelude module for convenient imports.
///
/// ```rust
/// use monzo_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{AuthState, AuthorizationRequest, Credential, OAuthApp, TokenManager};
    pub use crate::client::{ClientConfig, MonzoClient, MonzoClientBuilder, RetryPolicy};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::models::{
        Account, AccountId, Attachment, Balance, FeedItem, Merchant, NewFeedItem, Pot, PotId,
        Since, Transaction, TransactionId, TransactionsQuery, Webhook, WebhookId, WhoAmI,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "https://api.monzo.com");
        assert_eq!(config.token_url, "https://api.monzo.com/oauth2/token");
        assert_eq!(config.retry.max_retries(), 3);
        assert_eq!(config.retry.base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_account_id_creation() {
        let account = models::AccountId::new("acc_1");
        assert_eq!(account.as_str(), "acc_1");
    }
}

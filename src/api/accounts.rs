//! Accounts service.

use std::sync::Arc;

use crate::client::ClientInner;
use crate::models::{Account, AccountId};
use crate::Result;

/// Service for account operations.
///
/// # Example
///
/// ```no_run
/// # fn example(client: monzo_rs::MonzoClient) -> monzo_rs::Result<()> {
/// for account in client.accounts().list()? {
///     println!("{} ({})", account.id, account.account_type);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AccountsService {
    inner: Arc<ClientInner>,
}

impl AccountsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// List the user's open accounts. Closed accounts are left out.
    pub fn list(&self) -> Result<Vec<Account>> {
        #[derive(serde::Deserialize)]
        struct Response {
            accounts: Vec<Account>,
        }
        let response: Response = self.inner.get("/accounts")?;
        Ok(response
            .accounts
            .into_iter()
            .filter(|account| !account.closed)
            .collect())
    }

    /// Get a single account, open or closed.
    pub fn get(&self, account_id: &AccountId) -> Result<Account> {
        #[derive(serde::Deserialize)]
        struct Response {
            account: Account,
        }
        let response: Response = self.inner.get(&format!("/accounts/{account_id}"))?;
        Ok(response.account)
    }
}

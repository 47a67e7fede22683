//! Balance service.

use std::sync::Arc;

use serde::Serialize;

use crate::client::ClientInner;
use crate::models::{AccountId, Balance};
use crate::Result;

/// Service for account balances.
pub struct BalancesService {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct BalanceQuery<'a> {
    account_id: &'a str,
}

impl BalancesService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Get the balance of an account.
    pub fn get(&self, account_id: &AccountId) -> Result<Balance> {
        self.inner.get_with_query(
            "/balance",
            &BalanceQuery {
                account_id: account_id.as_str(),
            },
        )
    }
}

//! Transactions service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::Serialize;
use tracing::debug;

use crate::client::{ClientInner, Paginator, DEFAULT_PAGE_SIZE};
use crate::models::{
    AccountId, Since, Transaction, TransactionId, TransactionsQuery, MAX_TRANSACTIONS_LIMIT,
};
use crate::Result;

/// Service for transaction history.
///
/// Without a recent interactive login the API only returns the last 90
/// days; see [`MonzoClient::ensure_recent_authentication`](crate::MonzoClient::ensure_recent_authentication).
///
/// # Example
///
/// ```no_run
/// use monzo_rs::models::{AccountId, TransactionsQuery};
///
/// # fn example(client: monzo_rs::MonzoClient) -> monzo_rs::Result<()> {
/// let account = AccountId::new("acc_00009237aqC8c5umZmrRdh");
///
/// let recent = client
///     .transactions()
///     .list(&account, TransactionsQuery::new().limit(10))?;
/// for tx in recent {
///     println!("{} {} {}", tx.created, tx.amount, tx.description);
/// }
///
/// let everything = client
///     .transactions()
///     .list_all(&account, TransactionsQuery::new(), None)?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionsService {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct ListParams<'a> {
    account_id: &'a str,
    since: Option<&'a Since>,
    before: Option<DateTime<Utc>>,
    limit: Option<u32>,
}

#[derive(serde::Deserialize)]
struct ListResponse {
    transactions: Vec<Transaction>,
}

#[derive(serde::Deserialize)]
struct SingleResponse {
    transaction: Transaction,
}

impl TransactionsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// List one page of transactions.
    pub fn list(&self, account_id: &AccountId, query: TransactionsQuery) -> Result<Vec<Transaction>> {
        fetch_page(&self.inner, account_id, &query, None, query.limit.map(clamp_limit))
    }

    /// Walk the whole listing page by page.
    ///
    /// Pages hold `query.limit` transactions (100 when unset). From the
    /// second page on, `since` is replaced by the id of the last transaction
    /// received.
    pub fn pages(
        &self,
        account_id: &AccountId,
        query: TransactionsQuery,
    ) -> Paginator<Transaction, impl FnMut(Option<&str>) -> Result<Vec<Transaction>>> {
        let inner = self.inner.clone();
        let account_id = account_id.clone();
        let page_size = clamp_limit(query.limit.unwrap_or(DEFAULT_PAGE_SIZE as u32));

        Paginator::new(page_size as usize, move |cursor: Option<&str>| {
            let cursor = cursor.map(|id| Since::Transaction(TransactionId::new(id)));
            fetch_page(&inner, &account_id, &query, cursor.as_ref(), Some(page_size))
        })
    }

    /// Fetch every transaction matching `query`, stopping after `max_pages`
    /// pages when given.
    pub fn list_all(
        &self,
        account_id: &AccountId,
        query: TransactionsQuery,
        max_pages: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let pages = self.pages(account_id, query);
        let transactions = match max_pages {
            Some(max) => pages.max_pages(max).collect_all()?,
            None => pages.collect_all()?,
        };
        debug!(account_id = %account_id, count = transactions.len(), "fetched all transactions");
        Ok(transactions)
    }

    /// Get a single transaction.
    pub fn get(&self, transaction_id: &TransactionId) -> Result<Transaction> {
        let response: SingleResponse = self
            .inner
            .get(&format!("/transactions/{transaction_id}"))?;
        Ok(response.transaction)
    }

    /// Set metadata keys on a transaction. An empty value deletes the key.
    pub fn annotate(
        &self,
        transaction_id: &TransactionId,
        metadata: &HashMap<String, String>,
    ) -> Result<Transaction> {
        #[derive(Serialize)]
        struct Body<'a> {
            metadata: &'a HashMap<String, String>,
        }
        let response: SingleResponse = self.inner.patch_json(
            &format!("/transactions/{transaction_id}"),
            &Body { metadata },
        )?;
        Ok(response.transaction)
    }

    /// Attach a receipt to a transaction. `receipt` must follow Monzo's
    /// receipt schema; it is sent as JSON text in a form field.
    pub fn add_receipt<R: Serialize>(&self, transaction_id: &TransactionId, receipt: &R) -> Result<()> {
        #[derive(Serialize)]
        struct Body<'a, R> {
            transaction_id: &'a str,
            receipt: &'a R,
        }
        self.inner
            .put_form::<IgnoredAny, _>(
                "/transaction-receipts",
                &Body {
                    transaction_id: transaction_id.as_str(),
                    receipt,
                },
            )
            .map(|_| ())
    }
}

/// `limit` may have been set on the public field directly.
fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_TRANSACTIONS_LIMIT)
}

fn fetch_page(
    inner: &ClientInner,
    account_id: &AccountId,
    query: &TransactionsQuery,
    cursor: Option<&Since>,
    limit: Option<u32>,
) -> Result<Vec<Transaction>> {
    let params = ListParams {
        account_id: account_id.as_str(),
        since: cursor.or(query.since.as_ref()),
        before: query.before,
        limit,
    };
    let response: ListResponse = inner.get_with_query("/transactions", &params)?;
    Ok(response.transactions)
}

//! Pots service.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::client::ClientInner;
use crate::models::{AccountId, Pot, PotId};
use crate::{Error, Result};

/// Service for savings pots.
///
/// Moving money requires a dedupe id; when none is given a random one is
/// generated, so a retried call is only deduplicated within that call.
///
/// # Example
///
/// ```no_run
/// use monzo_rs::models::AccountId;
///
/// # fn example(client: monzo_rs::MonzoClient) -> monzo_rs::Result<()> {
/// let account = AccountId::new("acc_00009237aqC8c5umZmrRdh");
/// let pot = client.pots().get_by_name(&account, "Holiday")?;
/// client.pots().deposit(&pot.id, &account, 2500, None)?;
/// # Ok(())
/// # }
/// ```
pub struct PotsService {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct ListQuery<'a> {
    current_account_id: &'a str,
}

#[derive(Serialize)]
struct DepositForm<'a> {
    source_account_id: &'a str,
    amount: i64,
    dedupe_id: String,
}

#[derive(Serialize)]
struct WithdrawForm<'a> {
    destination_account_id: &'a str,
    amount: i64,
    dedupe_id: String,
}

impl PotsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// List the pots of an account, keeping those whose name contains
    /// `name_filter` (case-insensitive) when one is given.
    pub fn list(&self, account_id: &AccountId, name_filter: Option<&str>) -> Result<Vec<Pot>> {
        #[derive(serde::Deserialize)]
        struct Response {
            pots: Vec<Pot>,
        }
        let response: Response = self.inner.get_with_query(
            "/pots",
            &ListQuery {
                current_account_id: account_id.as_str(),
            },
        )?;

        let pots = match name_filter {
            Some(filter) => {
                let filter = filter.to_lowercase();
                response
                    .pots
                    .into_iter()
                    .filter(|pot| pot.name.to_lowercase().contains(&filter))
                    .collect()
            }
            None => response.pots,
        };
        Ok(pots)
    }

    /// Get a pot by id.
    pub fn get(&self, pot_id: &PotId) -> Result<Pot> {
        #[derive(serde::Deserialize)]
        struct Response {
            pot: Pot,
        }
        let response: Response = self.inner.get(&format!("/pots/{pot_id}"))?;
        Ok(response.pot)
    }

    /// Find the pot named exactly `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no pot has that name.
    pub fn get_by_name(&self, account_id: &AccountId, name: &str) -> Result<Pot> {
        self.list(account_id, Some(name))?
            .into_iter()
            .find(|pot| pot.name.to_lowercase() == name.to_lowercase())
            .ok_or_else(|| {
                Error::NotFound(format!("no pot named '{name}' in account {account_id}"))
            })
    }

    /// Move `amount` minor units from `source_account_id` into the pot.
    pub fn deposit(
        &self,
        pot_id: &PotId,
        source_account_id: &AccountId,
        amount: i64,
        dedupe_id: Option<&str>,
    ) -> Result<Pot> {
        let form = DepositForm {
            source_account_id: source_account_id.as_str(),
            amount,
            dedupe_id: dedupe_or_random(dedupe_id),
        };
        debug!(pot_id = %pot_id, amount, dedupe_id = %form.dedupe_id, "depositing into pot");
        self.inner
            .put_form(&format!("/pots/{pot_id}/deposit"), &form)
    }

    /// Move `amount` minor units out of the pot into `destination_account_id`.
    pub fn withdraw(
        &self,
        pot_id: &PotId,
        destination_account_id: &AccountId,
        amount: i64,
        dedupe_id: Option<&str>,
    ) -> Result<Pot> {
        let form = WithdrawForm {
            destination_account_id: destination_account_id.as_str(),
            amount,
            dedupe_id: dedupe_or_random(dedupe_id),
        };
        debug!(pot_id = %pot_id, amount, dedupe_id = %form.dedupe_id, "withdrawing from pot");
        self.inner
            .put_form(&format!("/pots/{pot_id}/withdraw"), &form)
    }
}

fn dedupe_or_random(dedupe_id: Option<&str>) -> String {
    dedupe_id
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

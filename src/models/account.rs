//! Account, balance and token-owner models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::AccountId;

/// A Monzo account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account id
    pub id: AccountId,
    /// Display name, absent on most personal accounts
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description, usually the owner's user id
    #[serde(default)]
    pub description: Option<String>,
    /// ISO 4217 currency code
    #[serde(default)]
    pub currency: Option<String>,
    /// Account type, e.g. `uk_retail` or `uk_retail_joint`
    #[serde(rename = "type")]
    pub account_type: String,
    /// When the account was opened
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Whether the account is closed
    #[serde(default)]
    pub closed: bool,
}

/// Balance of an account. Amounts are in minor units (pence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Available balance
    pub balance: i64,
    /// Balance including pots
    #[serde(default)]
    pub total_balance: Option<i64>,
    /// Balance including pending and flexible amounts
    #[serde(default)]
    pub balance_including_flexible_savings: Option<i64>,
    /// ISO 4217 currency code
    pub currency: String,
    /// Amount spent today (negative)
    pub spend_today: i64,
    /// Currency of spending abroad, empty when none
    #[serde(default)]
    pub local_currency: Option<String>,
    /// Exchange rate to `local_currency`
    #[serde(default)]
    pub local_exchange_rate: Option<f64>,
    /// Spending today per foreign currency
    #[serde(default)]
    pub local_spend: Vec<LocalSpend>,
}

/// Spending in one foreign currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSpend {
    /// Amount spent, in minor units of `currency`
    pub spend_today: i64,
    /// ISO 4217 currency code
    pub currency: String,
}

/// Response of `/ping/whoami`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmI {
    /// Whether the token is valid
    pub authenticated: bool,
    /// OAuth client the token was issued to
    pub client_id: String,
    /// Owner of the token
    pub user_id: String,
}

//! Pot models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::{AccountId, PotId};

/// A savings pot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pot {
    /// Pot id
    pub id: PotId,
    /// Display name
    pub name: String,
    /// Background style
    #[serde(default)]
    pub style: Option<String>,
    /// Balance in minor units
    pub balance: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Savings goal in minor units
    #[serde(default)]
    pub goal_amount: Option<i64>,
    /// Account the pot belongs to
    #[serde(default)]
    pub current_account_id: Option<AccountId>,
    /// ISA wrapper type, if any
    #[serde(default)]
    pub isa_wrapper: Option<String>,
    /// When the pot was created
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// When the pot was last updated
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Whether the pot was deleted
    #[serde(default)]
    pub deleted: bool,
    /// Whether the pot is locked
    #[serde(default)]
    pub locked: bool,
}

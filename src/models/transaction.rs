//! Transaction, merchant and attachment models.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::primitives::{empty_string_as_none, AccountId, AttachmentId, TransactionId};
use crate::client::Cursor;

/// A card payment, transfer, top-up or pot movement.
///
/// Amounts are in minor units; negative values are debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id
    pub id: TransactionId,
    /// Account the transaction belongs to
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Amount in minor units
    pub amount: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Raw description from the scheme
    #[serde(default)]
    pub description: String,
    /// Spending category, e.g. `eating_out`
    #[serde(default)]
    pub category: String,
    /// When the transaction was created
    pub created: DateTime<Utc>,
    /// When the transaction settled; `None` while pending
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub settled: Option<DateTime<Utc>>,
    /// When the transaction was last updated
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Merchant id, or full details when expanded
    #[serde(default)]
    pub merchant: Option<Merchant>,
    /// User notes
    #[serde(default)]
    pub notes: String,
    /// Key/value annotations
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Account balance after the transaction (deprecated by the API)
    #[serde(default)]
    pub account_balance: Option<i64>,
    /// Amount in the local currency
    #[serde(default)]
    pub local_amount: Option<i64>,
    /// Local ISO 4217 currency code
    #[serde(default)]
    pub local_currency: Option<String>,
    /// Why the transaction was declined, if it was
    #[serde(default)]
    pub decline_reason: Option<String>,
    /// Whether this is a top-up
    #[serde(default)]
    pub is_load: Option<bool>,
    /// Payment scheme, e.g. `mastercard` or `uk_retail_pot`
    #[serde(default)]
    pub scheme: Option<String>,
    /// Dedupe id supplied when the transaction was created
    #[serde(default)]
    pub dedupe_id: Option<String>,
    /// Whether the amount may still change
    #[serde(default)]
    pub amount_is_pending: Option<bool>,
    /// Whether the transaction counts towards spending
    #[serde(default)]
    pub include_in_spending: Option<bool>,
    /// Whether this account originated the transaction
    #[serde(default)]
    pub originator: Option<bool>,
    /// Settled amount, when different from `amount`
    #[serde(default)]
    pub settled_amount: Option<i64>,
    /// Files attached to the transaction
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    /// International payment details
    #[serde(default)]
    pub international: Option<Value>,
    /// ATM fee breakdown
    #[serde(default)]
    pub atm_fees_detailed: Option<Value>,
}

impl Cursor for Transaction {
    fn cursor(&self) -> &str {
        self.id.as_str()
    }
}

/// A merchant reference, expanded with `expand[]=merchant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Merchant {
    /// Only the merchant id
    Id(String),
    /// Full merchant details
    Details(Box<MerchantDetails>),
}

/// Expanded merchant information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantDetails {
    /// Merchant id
    pub id: String,
    /// Merchant group id
    #[serde(default)]
    pub group_id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Logo URL
    #[serde(default)]
    pub logo: Option<String>,
    /// Emoji shown in the app
    #[serde(default)]
    pub emoji: Option<String>,
    /// Merchant category
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the merchant is online-only
    #[serde(default)]
    pub online: Option<bool>,
    /// Whether the merchant is an ATM
    #[serde(default)]
    pub atm: Option<bool>,
    /// Postal address
    #[serde(default)]
    pub address: Option<MerchantAddress>,
}

/// Merchant postal address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAddress {
    /// Street address
    #[serde(default)]
    pub address: Option<String>,
    /// City
    #[serde(default)]
    pub city: Option<String>,
    /// Country code
    #[serde(default)]
    pub country: Option<String>,
    /// Postcode
    #[serde(default)]
    pub postcode: Option<String>,
    /// Region
    #[serde(default)]
    pub region: Option<String>,
    /// Latitude
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A file attached to a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id
    pub id: AttachmentId,
    /// Where the file is served from
    pub file_url: String,
    /// MIME type
    pub file_type: String,
    /// Caller-chosen id used when registering
    #[serde(default)]
    pub external_id: Option<String>,
    /// Transaction the file is attached to
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
    /// Owner of the attachment
    #[serde(default)]
    pub user_id: Option<String>,
    /// When the attachment was registered
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// A pre-signed upload target returned by `/attachment/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrl {
    /// URL the file will be served from after upload
    pub file_url: String,
    /// Pre-signed URL to `PUT` the file to
    pub upload_url: String,
}

/// Lower bound of a transaction listing.
///
/// Monzo accepts either a timestamp or a transaction id; with an id the
/// listing starts after that transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Since {
    /// Transactions created at or after this instant
    Timestamp(DateTime<Utc>),
    /// Transactions created after this one
    Transaction(TransactionId),
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Since::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Since::Transaction(id) => f.write_str(id.as_str()),
        }
    }
}

impl Serialize for Since {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<DateTime<Utc>> for Since {
    fn from(ts: DateTime<Utc>) -> Self {
        Since::Timestamp(ts)
    }
}

impl From<TransactionId> for Since {
    fn from(id: TransactionId) -> Self {
        Since::Transaction(id)
    }
}

/// Largest page the transactions endpoint returns.
pub const MAX_TRANSACTIONS_LIMIT: u32 = 100;

/// Filters for listing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionsQuery {
    /// Lower bound
    pub since: Option<Since>,
    /// Upper bound, exclusive
    pub before: Option<DateTime<Utc>>,
    /// Page size; the API caps it at 100
    pub limit: Option<u32>,
}

impl TransactionsQuery {
    /// An unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lower bound.
    pub fn since(mut self, since: impl Into<Since>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Set the upper bound.
    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Set the page size, clamped to `1..=100`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.clamp(1, MAX_TRANSACTIONS_LIMIT));
        self
    }
}

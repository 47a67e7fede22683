//! Identifier newtypes and shared serde helpers.
//!
//! Monzo identifiers are opaque strings with a type prefix (`acc_`, `tx_`,
//! `pot_`, `webhook_`). Wrapping each one keeps an account id from being
//! passed where a pot id is expected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id! {
    /// An account id, e.g. `acc_00009237aqC8c5umZmrRdh`.
    ///
    /// ```
    /// use monzo_rs::models::AccountId;
    ///
    /// let account = AccountId::new("acc_00009237aqC8c5umZmrRdh");
    /// assert_eq!(account.as_str(), "acc_00009237aqC8c5umZmrRdh");
    /// ```
    AccountId
}

string_id! {
    /// A transaction id, e.g. `tx_00008zIcpb1TB4yeIFXMzx`.
    TransactionId
}

string_id! {
    /// A pot id.
    PotId
}

string_id! {
    /// A webhook id.
    WebhookId
}

string_id! {
    /// An attachment id.
    AttachmentId
}

/// Decode an optional timestamp that the API sends as `""` when unset
/// (`settled` on pending transactions).
pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

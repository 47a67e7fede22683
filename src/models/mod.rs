//! Data models for the Monzo API.
//!
//! - [`primitives`] - identifier newtypes like `AccountId` and `PotId`
//! - [`account`] - accounts, balances and `whoami`
//! - [`transaction`] - transactions, merchants and attachments
//! - [`pot`] - savings pots
//! - [`webhook`] - webhooks and feed items

pub mod account;
pub mod pot;
pub mod primitives;
pub mod transaction;
pub mod webhook;

pub use account::*;
pub use pot::*;
pub use primitives::{AccountId, AttachmentId, PotId, TransactionId, WebhookId};
pub use transaction::*;
pub use webhook::*;
